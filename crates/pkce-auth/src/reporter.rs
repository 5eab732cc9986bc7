//! Step-by-step progress output for the authorization flow
//!
//! The flow never logs through a process-wide logger of its own. Callers
//! hand `OAuthClient` a `FlowReporter`; the CLI uses `TracingReporter`,
//! tests and embedders can use `SilentReporter` or their own sink.

use tracing::{debug, info};

/// Sink for progress and explanatory output.
pub trait FlowReporter: Send + Sync {
    /// A numbered milestone of the flow.
    fn step(&self, number: u8, title: &str, description: &str);

    /// A longer explanation of the protocol concept behind the current step.
    fn explain(&self, topic: &str, text: &str);

    /// Low-level detail (URLs, endpoints) useful when debugging.
    fn detail(&self, message: &str);
}

/// Emits `tracing` events: steps at info, explanations at info when
/// enabled, details at debug.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter {
    explain: bool,
}

impl TracingReporter {
    pub fn new(explain: bool) -> Self {
        Self { explain }
    }
}

impl FlowReporter for TracingReporter {
    fn step(&self, number: u8, title: &str, description: &str) {
        info!(step = number, title, "{description}");
    }

    fn explain(&self, topic: &str, text: &str) {
        if self.explain {
            info!(topic, "\n{text}");
        }
    }

    fn detail(&self, message: &str) {
        debug!("{message}");
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl FlowReporter for SilentReporter {
    fn step(&self, _number: u8, _title: &str, _description: &str) {}
    fn explain(&self, _topic: &str, _text: &str) {}
    fn detail(&self, _message: &str) {}
}

pub(crate) const PKCE_EXPLANATION: &str = "\
PKCE binds the authorization code to this process. A random code verifier \
stays in memory; only its SHA-256 hash (the code challenge) is sent to the \
provider. When the code is exchanged, the provider hashes the verifier we \
send and compares: an intercepted code is useless without the verifier.";

pub(crate) const AUTHORIZATION_URL_EXPLANATION: &str = "\
The authorization URL carries:
  client_id              which application is asking
  redirect_uri           where the provider sends the browser afterwards
  response_type=code     authorization code flow
  scope                  the permissions requested
  state                  random value echoed back, defends against CSRF
  code_challenge         the PKCE challenge
  code_challenge_method  S256, the challenge is a SHA-256 hash
  audience               (optional) intended recipient of the access token";

pub(crate) const CALLBACK_EXPLANATION: &str = "\
After the user consents, the provider redirects the browser to a listener \
on this machine. The redirect carries a short-lived, single-use \
authorization code and the state value we generated.";

pub(crate) const TOKEN_EXCHANGE_EXPLANATION: &str = "\
The code is exchanged at the token endpoint together with the code \
verifier and the exact redirect URI used in the authorization request. \
The response contains an access token, its lifetime, and for OpenID \
Connect scopes an ID token describing the user.";

pub(crate) const ID_TOKEN_EXPLANATION: &str = "\
The ID token is a JWT: header, payload and signature, base64url-encoded \
and joined with dots. Its payload names the issuer (iss), the user (sub), \
the intended client (aud), and when it was issued (iat) and expires (exp). \
The signature is not verified here.";
