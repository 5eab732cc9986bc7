//! Authorization code exchange
//!
//! One form-encoded POST to the token endpoint. Failures are split by
//! stage so the caller can tell a network problem (`Transport`, worth
//! retrying by hand) from a provider refusal (`ProviderRejected`, the code
//! is spent) from a protocol mismatch (`MalformedResponse`). Nothing here
//! retries.

use std::fmt;
use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::flow::AuthorizationAttempt;

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Space-separated scopes actually granted; may differ from the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn granted_scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Exchange an authorization code for tokens.
///
/// An empty `code` fails with `EmptyCode` before any network I/O. The
/// `redirect_uri` sent is the attempt's, byte-identical to the one in the
/// authorization URL. `client_secret` is only sent when configured and
/// non-empty.
pub async fn exchange_code(
    client: &reqwest::Client,
    attempt: &AuthorizationAttempt,
    code: &str,
    timeout: Duration,
) -> Result<TokenResponse> {
    if code.is_empty() {
        return Err(Error::EmptyCode);
    }

    let config = attempt.config();
    let mut form = vec![
        ("client_id", config.client_id.as_str()),
        ("code", code),
        ("code_verifier", attempt.verifier().as_str()),
        ("grant_type", "authorization_code"),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];
    if let Some(secret) = config.client_secret.as_ref().filter(|s| !s.is_empty()) {
        form.push(("client_secret", secret.expose().as_str()));
    }

    debug!(
        attempt_id = %attempt.id(),
        endpoint = %config.token_endpoint,
        "sending token request"
    );

    let response = client
        .post(config.token_endpoint.clone())
        .header(ACCEPT, "application/json")
        .timeout(timeout)
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::Transport(format!(
                    "token request timed out after {}s",
                    timeout.as_secs_f32()
                ))
            } else {
                Error::Transport(format!("token request failed: {e}"))
            }
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Transport(format!("reading token response: {e}")))?;

    if !status.is_success() {
        return Err(Error::ProviderRejected {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<TokenResponse>(&body).map_err(|e| Error::MalformedResponse(e.to_string()))
}
