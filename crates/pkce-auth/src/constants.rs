//! Provider defaults
//!
//! Google's endpoints are the defaults because they are what most desktop
//! OAuth clients are registered against. Every value can be overridden
//! through `ClientConfig`.

use std::time::Duration;

/// Google OAuth2 authorization endpoint
pub const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// OpenID Connect scopes requested when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

/// Loopback port for the callback listener
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

/// Route served by the callback listener
pub const DEFAULT_CALLBACK_PATH: &str = "/oauth/callback";

/// How long the user has to finish the browser leg of the flow
pub const DEFAULT_REDIRECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-request timeout for the token endpoint call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
