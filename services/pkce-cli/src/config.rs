//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from OAUTH_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly.

use common::Secret;
use pkce_auth::{
    ClientConfig, DEFAULT_CALLBACK_PATH, DEFAULT_CALLBACK_PORT, DEFAULT_REDIRECT_TIMEOUT,
    DEFAULT_SCOPES, GOOGLE_AUTHORIZATION_ENDPOINT, GOOGLE_TOKEN_ENDPOINT,
};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "oauth2-pkce.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientSettings,
    pub callback: CallbackSettings,
    pub logging: LoggingSettings,
}

/// Client registration and provider endpoints
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to
    /// OAUTH_CLIENT_SECRET)
    pub client_secret_file: Option<PathBuf>,
    pub scopes: Vec<String>,
    pub audience: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Derived from the callback settings when unset
    pub redirect_uri: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            client_secret_file: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            audience: None,
            authorization_endpoint: GOOGLE_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            redirect_uri: None,
        }
    }
}

/// Local redirect listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CallbackSettings {
    pub port: u16,
    pub path: String,
    pub timeout_secs: u64,
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_CALLBACK_PORT,
            path: DEFAULT_CALLBACK_PATH.to_string(),
            timeout_secs: DEFAULT_REDIRECT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Print protocol explanations alongside each step
    pub explain: bool,
    /// JSON log lines instead of the compact human format
    pub json: bool,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables
    /// and validate.
    ///
    /// Client secret resolution order:
    /// 1. OAUTH_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Load from the resolved path. A missing file is only an error when the
    /// path was asked for explicitly; otherwise defaults plus environment
    /// are used.
    pub fn locate(cli_path: Option<&str>) -> common::Result<Self> {
        let explicit = cli_path.is_some() || std::env::var_os("CONFIG_PATH").is_some();
        let path = Self::resolve_path(cli_path);
        if !explicit && !path.exists() {
            return Config::default().finish();
        }
        Self::load(&path)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    fn finish(mut self) -> common::Result<Self> {
        self.apply_env()?;
        self.validate()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Ok(id) = std::env::var("OAUTH_CLIENT_ID") {
            self.client.client_id = id;
        }
        if let Ok(uri) = std::env::var("OAUTH_REDIRECT_URI") {
            self.client.redirect_uri = Some(uri);
        }

        // Env var takes precedence over file
        if let Ok(secret) = std::env::var("OAUTH_CLIENT_SECRET") {
            if !secret.is_empty() {
                self.client.client_secret = Some(Secret::new(secret));
            }
        } else if let Some(ref secret_file) = self.client.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                self.client.client_secret = Some(Secret::new(secret));
            }
        }
        Ok(())
    }

    /// Check the settings that would otherwise only fail mid-flow.
    ///
    /// Run again after applying CLI overrides.
    pub fn validate(&self) -> common::Result<()> {
        if self.client.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "client_id is required (set [client].client_id or OAUTH_CLIENT_ID)".into(),
            ));
        }

        parse_endpoint("authorization_endpoint", &self.client.authorization_endpoint)?;
        parse_endpoint("token_endpoint", &self.client.token_endpoint)?;

        if self.client.scopes.is_empty() {
            return Err(common::Error::Config(
                "scopes must contain at least one scope".into(),
            ));
        }

        if self.callback.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.callback.path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "callback path must start with '/', got: {}",
                self.callback.path
            )));
        }

        if let Some(ref uri) = self.client.redirect_uri {
            if self.callback.port == 0 {
                return Err(common::Error::Config(
                    "an explicit redirect_uri needs a fixed callback port, not 0".into(),
                ));
            }
            let expected = self.expected_redirect_uri();
            if *uri != expected {
                return Err(common::Error::Config(format!(
                    "redirect_uri {uri} does not match the callback listener {expected}"
                )));
            }
        }

        Ok(())
    }

    /// `http://localhost:{port}{path}` for the configured callback.
    pub fn expected_redirect_uri(&self) -> String {
        format!(
            "http://localhost:{}{}",
            self.callback.port, self.callback.path
        )
    }

    /// Client configuration for the flow. `redirect_uri` is the URI the
    /// running callback listener actually serves.
    pub fn client_config(&self, redirect_uri: String) -> common::Result<ClientConfig> {
        let mut client = ClientConfig::new(
            self.client.client_id.clone(),
            redirect_uri,
            parse_endpoint("authorization_endpoint", &self.client.authorization_endpoint)?,
            parse_endpoint("token_endpoint", &self.client.token_endpoint)?,
        );
        client.client_secret = self.client.client_secret.clone();
        client.scopes = self.client.scopes.clone();
        client.audience = self.client.audience.clone();
        Ok(client)
    }
}

/// Serializes tests that read or mutate environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn parse_endpoint(name: &str, value: &str) -> common::Result<Url> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {value}"
        )));
    }
    Url::parse(value).map_err(|e| common::Error::Config(format!("{name} is not a valid URL: {e}")))
}
