//! CLI error type, exit codes and hints

use callback_server::Error as CallbackError;
use pkce_auth::Error as FlowError;
use thiserror::Error;

/// Everything that can end a run early.
///
/// Each kind maps to its own exit code so scripts can tell a denied consent
/// from a network failure without parsing stderr.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    #[error("invalid arguments: {0}")]
    Usage(String),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("interrupted before the authorization completed")]
    Interrupted,
}

impl From<CallbackError> for Error {
    fn from(e: CallbackError) -> Self {
        Error::Flow(e.into())
    }
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Usage(_) => 2,
            Error::Interrupted => 130,
            Error::Flow(e) => match e {
                FlowError::Callback(CallbackError::PortUnavailable { .. }) => 3,
                FlowError::Callback(CallbackError::InvalidPath(_)) => 2,
                FlowError::Callback(CallbackError::Timeout(_)) => 4,
                FlowError::Callback(CallbackError::ProviderError { .. }) => 5,
                FlowError::Callback(CallbackError::Transport(_)) | FlowError::Transport(_) => 6,
                FlowError::ProviderRejected { .. } => 7,
                FlowError::MalformedResponse(_)
                | FlowError::MalformedToken(_)
                | FlowError::Expired { .. }
                | FlowError::IssuedInFuture { .. }
                | FlowError::AudienceMismatch { .. }
                | FlowError::EmptyCode
                | FlowError::Callback(CallbackError::OutcomeConsumed) => 8,
                FlowError::StateMismatch => 9,
                FlowError::Entropy(_) => 10,
                FlowError::RedirectMismatch { .. } => 2,
                FlowError::InvalidVerifier(_) => 1,
            },
        }
    }

    /// What the user can do about it, when there is something to do.
    pub fn hint(&self) -> Option<String> {
        let hint = match self {
            Error::Config(_) => {
                "check the config file (--config or CONFIG_PATH) and the OAUTH_* environment variables"
                    .to_string()
            }
            Error::Usage(_) => {
                "usage: oauth2-pkce [--config <path>] [--port <port>] [--no-browser] [--explain]"
                    .to_string()
            }
            Error::Flow(FlowError::Callback(CallbackError::PortUnavailable { port, .. })) => {
                format!(
                    "port {port} is busy; free it or pass --port <other> and register that redirect URI with the provider"
                )
            }
            Error::Flow(FlowError::Callback(CallbackError::Timeout(_))) => {
                "the browser never came back; rerun and finish the consent screen before [callback].timeout_secs"
                    .to_string()
            }
            Error::Flow(FlowError::Callback(CallbackError::ProviderError { code, .. }))
                if code == "access_denied" =>
            {
                "consent was declined in the browser; rerun and approve the request".to_string()
            }
            Error::Flow(FlowError::Callback(CallbackError::ProviderError { .. })) => {
                "the provider refused the authorization request; check client_id, scopes and the registered redirect URI"
                    .to_string()
            }
            Error::Flow(FlowError::ProviderRejected { .. }) => {
                "the token endpoint refused the code; check the client secret and that the redirect URI is registered exactly"
                    .to_string()
            }
            Error::Flow(FlowError::Transport(_))
            | Error::Flow(FlowError::Callback(CallbackError::Transport(_))) => {
                "check network connectivity to the token endpoint and rerun".to_string()
            }
            Error::Flow(FlowError::StateMismatch) => {
                "the redirect did not belong to this login; start a fresh login and use only its URL"
                    .to_string()
            }
            Error::Flow(FlowError::RedirectMismatch { .. }) => {
                "make [client].redirect_uri match the [callback] port and path".to_string()
            }
            _ => return None,
        };
        Some(hint)
    }
}

/// Result alias using CLI Error
pub type Result<T> = std::result::Result<T, Error>;
