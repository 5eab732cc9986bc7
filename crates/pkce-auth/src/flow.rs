//! Authorization Code + PKCE flow controller
//!
//! `AuthorizationAttempt` owns everything one run of the flow needs: its
//! PKCE pair, its state token and the client configuration. The state
//! token is never stored anywhere else, so two attempts cannot share or
//! overwrite each other's expected state.
//!
//! `OAuthClient::authorize` drives a whole attempt against a running
//! `CallbackServer`: build the URL, hand it to a `BrowserLauncher`, wait
//! for the redirect, stop the listener, check `state`, exchange the code
//! and decode the ID token.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use callback_server::CallbackServer;
use common::Secret;
use reqwest::Url;
use tracing::{info, warn};
use uuid::Uuid;

use crate::claims::{self, IdTokenClaims};
use crate::constants::{DEFAULT_REDIRECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SCOPES};
use crate::error::{Error, Result};
use crate::pkce::{self, CodeChallenge, CodeVerifier, StateToken};
use crate::reporter::{
    AUTHORIZATION_URL_EXPLANATION, CALLBACK_EXPLANATION, FlowReporter, ID_TOKEN_EXPLANATION,
    PKCE_EXPLANATION, SilentReporter, TOKEN_EXCHANGE_EXPLANATION,
};
use crate::token::{self, TokenResponse};

/// Client registration and provider endpoints.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    /// `None` for public clients; the secret is then never sent.
    pub client_secret: Option<Secret<String>>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Extra `audience` parameter some providers accept on the authorization
    /// request.
    pub audience: Option<String>,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
}

impl ClientConfig {
    /// Public client requesting the default OpenID Connect scopes.
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        authorization_endpoint: Url,
        token_endpoint: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            audience: None,
            authorization_endpoint,
            token_endpoint,
        }
    }
}

/// One run of the flow: fresh PKCE pair, fresh state, shared config.
pub struct AuthorizationAttempt {
    id: Uuid,
    verifier: CodeVerifier,
    challenge: CodeChallenge,
    state: StateToken,
    config: Arc<ClientConfig>,
}

impl AuthorizationAttempt {
    /// Generate the verifier, challenge and state for a new attempt.
    pub fn new(config: Arc<ClientConfig>) -> Result<Self> {
        let verifier = pkce::generate_verifier()?;
        let challenge = pkce::compute_challenge(&verifier);
        let state = pkce::generate_state()?;
        Ok(Self {
            id: Uuid::new_v4(),
            verifier,
            challenge,
            state,
            config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn verifier(&self) -> &CodeVerifier {
        &self.verifier
    }

    pub fn challenge(&self) -> &CodeChallenge {
        &self.challenge
    }

    pub fn state(&self) -> &StateToken {
        &self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The URL the user opens to grant consent.
    ///
    /// Appends `client_id`, `redirect_uri`, `response_type=code`, `scope`
    /// (space-joined), `state`, `code_challenge`, `code_challenge_method=S256`
    /// and, when configured, `audience`. Query parameters already on the
    /// endpoint are kept.
    pub fn authorization_url(&self) -> Url {
        let config = &self.config;
        let mut url = config.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &config.client_id)
                .append_pair("redirect_uri", &config.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &config.scopes.join(" "))
                .append_pair("state", self.state.as_str())
                .append_pair("code_challenge", self.challenge.as_str())
                .append_pair("code_challenge_method", "S256");
            if let Some(audience) = &config.audience {
                query.append_pair("audience", audience);
            }
        }
        url
    }

    /// Whether the `state` echoed on the redirect belongs to this attempt.
    pub fn verify_state(&self, received: Option<&str>) -> bool {
        received.is_some_and(|received| verify_state(received, self.state.as_str()))
    }
}

impl fmt::Debug for AuthorizationAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationAttempt")
            .field("id", &self.id)
            .field("verifier", &self.verifier)
            .field("challenge", &self.challenge)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Exact comparison. An empty value never matches, even against an empty
/// expectation.
pub fn verify_state(received: &str, expected: &str) -> bool {
    !received.is_empty() && !expected.is_empty() && received == expected
}

/// Puts the authorization URL in front of the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &Url) -> std::io::Result<()>;
}

/// Timeouts for one `authorize` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOptions {
    /// How long to wait for the browser redirect.
    pub redirect_timeout: Duration,
    /// Timeout for the token endpoint request.
    pub request_timeout: Duration,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            redirect_timeout: DEFAULT_REDIRECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Result of a successful flow.
#[derive(Debug, Clone)]
pub struct AuthorizedSession {
    pub tokens: TokenResponse,
    /// Decoded when the token response carried an ID token.
    pub claims: Option<IdTokenClaims>,
}

/// Entry point for running the flow against one provider registration.
pub struct OAuthClient {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    reporter: Arc<dyn FlowReporter>,
}

impl OAuthClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            reporter: Arc::new(SilentReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FlowReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the default HTTP client, e.g. to set a user agent or a
    /// connect timeout.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a new attempt with its own PKCE pair and state.
    pub fn new_attempt(&self) -> Result<AuthorizationAttempt> {
        AuthorizationAttempt::new(self.config.clone())
    }

    /// Exchange `code` for tokens. Consumes the attempt so its verifier is
    /// used at most once.
    pub async fn exchange_code(
        &self,
        attempt: AuthorizationAttempt,
        code: &str,
        timeout: Duration,
    ) -> Result<TokenResponse> {
        token::exchange_code(&self.http, &attempt, code, timeout).await
    }

    /// Run a full attempt against an already started receiver.
    ///
    /// The receiver is stopped before this returns, whatever the outcome.
    /// A launcher failure is not fatal: the URL has been reported and the
    /// user can still open it by hand.
    pub async fn authorize(
        &self,
        receiver: &CallbackServer,
        browser: &dyn BrowserLauncher,
        options: &FlowOptions,
    ) -> Result<AuthorizedSession> {
        let received = self.await_redirect(receiver, browser, options).await;
        receiver.stop().await;
        let (attempt, code) = received?;

        let reporter = &self.reporter;
        reporter.step(5, "Exchange Code for Token", "Trading the authorization code for tokens");
        reporter.explain("Token exchange", TOKEN_EXCHANGE_EXPLANATION);
        reporter.detail(&format!("token endpoint: {}", self.config.token_endpoint));
        let tokens = self
            .exchange_code(attempt, &code, options.request_timeout)
            .await?;

        reporter.step(
            6,
            "Tokens Received",
            &format!(
                "{} access token, expires in {}s",
                tokens.token_type, tokens.expires_in
            ),
        );

        let claims = match &tokens.id_token {
            Some(raw) => {
                reporter.step(7, "Parse ID Token", "Decoding and checking ID token claims");
                reporter.explain("ID token", ID_TOKEN_EXPLANATION);
                let claims = claims::parse_id_token(raw)?;
                claims::validate_claims(&claims, &self.config.client_id, SystemTime::now())?;
                info!(subject = %claims.subject, issuer = %claims.issuer, "ID token accepted");
                Some(claims)
            }
            None => None,
        };

        Ok(AuthorizedSession { tokens, claims })
    }

    /// Everything up to the redirect. Returns the attempt together with the
    /// received code once `state` has been checked.
    async fn await_redirect(
        &self,
        receiver: &CallbackServer,
        browser: &dyn BrowserLauncher,
        options: &FlowOptions,
    ) -> Result<(AuthorizationAttempt, String)> {
        let served = receiver.redirect_uri();
        if self.config.redirect_uri != served {
            return Err(Error::RedirectMismatch {
                configured: self.config.redirect_uri.clone(),
                actual: served,
            });
        }

        let reporter = &self.reporter;
        reporter.step(1, "Generate PKCE Pair", "Creating code verifier, challenge and state");
        reporter.explain("PKCE", PKCE_EXPLANATION);
        let attempt = self.new_attempt()?;
        info!(attempt_id = %attempt.id(), "authorization attempt started");

        reporter.step(
            2,
            "Generate Authorization URL",
            "Building the URL the user opens to grant consent",
        );
        reporter.explain("Authorization URL", AUTHORIZATION_URL_EXPLANATION);
        let url = attempt.authorization_url();
        reporter.detail(&format!("authorization URL: {url}"));

        reporter.step(3, "Open Browser", "Sending the user to the authorization server");
        if let Err(e) = browser.open(&url) {
            warn!(error = %e, %url, "could not open a browser, open the URL manually");
        }

        reporter.step(
            4,
            "Wait for Callback",
            &format!("Listening on {served}"),
        );
        reporter.explain("Callback", CALLBACK_EXPLANATION);
        let received = receiver.wait_for_outcome(options.redirect_timeout).await?;

        if !attempt.verify_state(received.state.as_deref()) {
            warn!(attempt_id = %attempt.id(), "state mismatch on redirect");
            return Err(Error::StateMismatch);
        }

        Ok((attempt, received.code))
    }
}
