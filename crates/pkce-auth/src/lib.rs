//! OAuth2 Authorization Code + PKCE client library
//!
//! Runs the browser-based authorization code flow for a command-line
//! client: PKCE pair and state generation, authorization URL building,
//! code-for-token exchange, and ID token decoding. The local redirect
//! listener lives in the `callback-server` crate; this crate drives it.
//!
//! Flow:
//! 1. `OAuthClient::new_attempt()` generates verifier, challenge and state
//! 2. `AuthorizationAttempt::authorization_url()` builds the consent URL
//! 3. A `BrowserLauncher` opens it, `CallbackServer` waits for the redirect
//! 4. `state` is checked against the attempt, then the listener is stopped
//! 5. `token::exchange_code()` trades the code and verifier for tokens
//! 6. `claims::parse_id_token()` + `claims::validate_claims()` check the ID token
//!
//! `OAuthClient::authorize()` runs all of the above in order.

pub mod claims;
pub mod constants;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod reporter;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use claims::{Audience, IdTokenClaims, parse_id_token, validate_claims};
pub use constants::*;
pub use error::{Error, Result};
pub use flow::{
    AuthorizationAttempt, AuthorizedSession, BrowserLauncher, ClientConfig, FlowOptions,
    OAuthClient, verify_state,
};
pub use pkce::{
    CodeChallenge, CodeVerifier, StateToken, compute_challenge, generate_state,
    generate_verifier, verify_challenge,
};
pub use reporter::{FlowReporter, SilentReporter, TracingReporter};
pub use token::{TokenResponse, exchange_code};
