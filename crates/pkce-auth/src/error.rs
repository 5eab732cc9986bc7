//! Error types for the authorization flow

/// Errors from PKCE generation, the token exchange, and ID token checks.
///
/// Every failure stage has its own variant so callers can print an
/// actionable message. Nothing in this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("entropy source failed: {0}")]
    Entropy(String),

    #[error("invalid code verifier: {0}")]
    InvalidVerifier(String),

    #[error("authorization code is empty")]
    EmptyCode,

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("token endpoint returned {status}: {body}")]
    ProviderRejected { status: u16, body: String },

    #[error("invalid token response: {0}")]
    MalformedResponse(String),

    #[error("malformed ID token: {0}")]
    MalformedToken(String),

    #[error("ID token is expired (exp: {exp}, now: {now})")]
    Expired { exp: i64, now: i64 },

    #[error("ID token was issued in the future (iat: {iat}, now: {now})")]
    IssuedInFuture { iat: i64, now: i64 },

    #[error("ID token audience {actual} does not match expected audience {expected}")]
    AudienceMismatch { expected: String, actual: String },

    #[error("state parameter mismatch: the redirect did not come from this authorization request")]
    StateMismatch,

    #[error("redirect URI mismatch: configured {configured}, callback server serves {actual}")]
    RedirectMismatch { configured: String, actual: String },

    #[error(transparent)]
    Callback(#[from] callback_server::Error),
}

impl Error {
    /// Whether repeating the same HTTP call could succeed. Only network-level
    /// failures qualify; a rejected code is spent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_rejected_carries_status_and_body() {
        let err = Error::ProviderRejected {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.into(),
        };
        assert_eq!(
            err.to_string(),
            r#"token endpoint returned 400: {"error":"invalid_grant"}"#
        );
    }

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(Error::Transport("connection refused".into()).is_retryable());
        assert!(!Error::EmptyCode.is_retryable());
        assert!(
            !Error::ProviderRejected {
                status: 500,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!Error::MalformedResponse("eof".into()).is_retryable());
    }

    #[test]
    fn callback_errors_pass_through_transparently() {
        let err: Error = callback_server::Error::Timeout(std::time::Duration::from_secs(5)).into();
        assert_eq!(
            err.to_string(),
            "timed out after 5s waiting for the authorization redirect"
        );
    }
}
