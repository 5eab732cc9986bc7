//! Error types for the callback receiver

use std::time::Duration;

/// Errors from binding, waiting on, or stopping the callback receiver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("callback port {port} is not available: {reason}")]
    PortUnavailable { port: u16, reason: String },

    #[error("invalid callback path {0:?}: must start with '/' and contain no route captures")]
    InvalidPath(String),

    #[error("timed out after {}s waiting for the authorization redirect", .0.as_secs())]
    Timeout(Duration),

    #[error("authorization server returned an error: {code} - {description}")]
    ProviderError { code: String, description: String },

    #[error("callback listener failed: {0}")]
    Transport(String),

    #[error("authorization outcome was already consumed")]
    OutcomeConsumed,
}

/// Result alias for callback receiver operations.
pub type Result<T> = std::result::Result<T, Error>;
