//! OAuth2 Authorization Code + PKCE command-line client
//!
//! Single-binary tool that:
//! 1. Loads client settings from TOML and the environment
//! 2. Starts a loopback listener for the provider redirect
//! 3. Opens the consent page in the user's browser
//! 4. Exchanges the returned code (with the PKCE verifier) for tokens
//! 5. Prints the tokens and ID token claims

mod browser;
mod config;
mod error;
mod summary;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callback_server::CallbackServer;
use pkce_auth::{
    AuthorizedSession, BrowserLauncher, DEFAULT_REQUEST_TIMEOUT, Error as FlowError, FlowOptions,
    OAuthClient, TracingReporter,
};

use crate::browser::{ManualBrowser, SystemBrowser};
use crate::config::Config;
use crate::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Command-line arguments
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config_path: Option<String>,
    port: Option<u16>,
    no_browser: bool,
    explain: bool,
}

impl Args {
    fn parse(args: &[String]) -> error::Result<Self> {
        let mut parsed = Args::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| Error::Usage("--config needs a path".into()))?;
                    parsed.config_path = Some(path.clone());
                }
                "--port" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| Error::Usage("--port needs a value".into()))?;
                    let port = value
                        .parse()
                        .map_err(|_| Error::Usage(format!("--port expects 0-65535, got: {value}")))?;
                    parsed.port = Some(port);
                }
                "--no-browser" => parsed.no_browser = true,
                "--explain" => parsed.explain = true,
                other => return Err(Error::Usage(format!("unknown argument: {other}"))),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(&args).await {
        Ok(session) => println!("{}", summary::format_session(&session)),
        Err(err) => {
            let (code, lines) = failure_report(&err);
            for line in lines {
                eprintln!("{line}");
            }
            std::process::exit(code);
        }
    }
}

/// Exit code plus the stderr lines for a failed run: one `error:` line and,
/// when there is one, a `hint:` line.
/// Printed straight to stderr: the subscriber may not be installed yet.
fn failure_report(err: &anyhow::Error) -> (i32, Vec<String>) {
    let (code, hint) = match err.downcast_ref::<Error>() {
        Some(e) => (e.exit_code(), e.hint()),
        None => (1, None),
    };
    let mut lines = vec![format!("error: {err:#}")];
    lines.extend(hint.map(|hint| format!("hint: {hint}")));
    (code, lines)
}

/// HTTP client for the token exchange.
fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("oauth2-pkce/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}

async fn run(raw_args: &[String]) -> anyhow::Result<AuthorizedSession> {
    let args = Args::parse(raw_args)?;

    let config_path = Config::resolve_path(args.config_path.as_deref());
    let mut config = Config::locate(args.config_path.as_deref())
        .map_err(Error::from)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    // CLI flags win over file and environment
    if let Some(port) = args.port {
        config.callback.port = port;
        config.validate().map_err(Error::from)?;
    }
    if args.explain {
        config.logging.explain = true;
    }

    init_tracing(config.logging.json);
    info!(
        path = %config_path.display(),
        client_id = %config.client.client_id,
        scopes = ?config.client.scopes,
        port = config.callback.port,
        "configuration loaded"
    );

    let receiver = CallbackServer::start(config.callback.port, &config.callback.path)
        .await
        .map_err(Error::from)?;

    let redirect_uri = config
        .client
        .redirect_uri
        .clone()
        .unwrap_or_else(|| receiver.redirect_uri());
    let client_config = match config.client_config(redirect_uri) {
        Ok(c) => c,
        Err(e) => {
            receiver.stop().await;
            return Err(Error::from(e).into());
        }
    };

    let http = match http_client() {
        Ok(http) => http,
        Err(e) => {
            receiver.stop().await;
            let err = FlowError::Transport(format!("building HTTP client: {e}"));
            return Err(Error::from(err).into());
        }
    };
    let client = OAuthClient::new(client_config)
        .with_http_client(http)
        .with_reporter(Arc::new(TracingReporter::new(config.logging.explain)));
    info!(
        redirect_uri = %client.config().redirect_uri,
        "authorization client ready"
    );
    let browser: Box<dyn BrowserLauncher> = if args.no_browser {
        Box::new(ManualBrowser)
    } else {
        Box::new(SystemBrowser)
    };
    let options = FlowOptions {
        redirect_timeout: Duration::from_secs(config.callback.timeout_secs),
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    };

    let outcome = tokio::select! {
        result = client.authorize(&receiver, browser.as_ref(), &options) => result.map_err(Error::from),
        _ = shutdown_signal() => {
            receiver.stop().await;
            Err(Error::Interrupted)
        }
    };

    let session = outcome?;
    info!("authorization complete");
    Ok(session)
}

/// Install the global subscriber: JSON lines or compact text, on stderr so
/// stdout carries only the summary.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
        }))
        .try_init()
        .ok();
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, abandoning authorization"),
        _ = terminate => info!("received SIGTERM, abandoning authorization"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_no_args_gives_defaults() {
        assert_eq!(Args::parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn parse_all_flags() {
        let parsed = Args::parse(&args(&[
            "--config",
            "/etc/oauth2-pkce.toml",
            "--port",
            "9090",
            "--no-browser",
            "--explain",
        ]))
        .unwrap();
        assert_eq!(
            parsed,
            Args {
                config_path: Some("/etc/oauth2-pkce.toml".into()),
                port: Some(9090),
                no_browser: true,
                explain: true,
            }
        );
    }

    #[test]
    fn parse_rejects_bad_port() {
        let err = Args::parse(&args(&["--port", "99999"])).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn parse_rejects_missing_values_and_unknown_flags() {
        assert!(matches!(
            Args::parse(&args(&["--config"])),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            Args::parse(&args(&["--port"])),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            Args::parse(&args(&["--verbose"])),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn anyhow_context_keeps_exit_code() {
        let err: anyhow::Error = Error::from(common::Error::Config("bad".into())).into();
        let err = err.context("failed to load config from oauth2-pkce.toml");
        let inner = err.downcast_ref::<Error>().unwrap();
        assert_eq!(inner.exit_code(), 2);
    }

    #[test]
    fn failure_report_writes_error_once_with_hint() {
        let err: anyhow::Error = Error::from(common::Error::Config("bad".into())).into();
        let err = err.context("failed to load config from oauth2-pkce.toml");

        let (code, lines) = failure_report(&err);
        assert_eq!(code, 2);
        assert_eq!(lines.len(), 2, "got: {lines:?}");
        assert_eq!(
            lines[0],
            "error: failed to load config from oauth2-pkce.toml: Configuration error: bad"
        );
        assert!(lines[1].starts_with("hint: check the config file"));
    }

    #[test]
    fn failure_report_without_hint_is_one_line() {
        let err: anyhow::Error = Error::Flow(FlowError::Expired { exp: 1, now: 2 }).into();
        let (code, lines) = failure_report(&err);
        assert_eq!(code, 8);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("error: "));

        let (code, lines) = failure_report(&anyhow::anyhow!("boom"));
        assert_eq!(code, 1);
        assert_eq!(lines, vec!["error: boom".to_string()]);
    }

    #[test]
    fn http_client_builds() {
        assert!(http_client().is_ok());
    }

    #[tokio::test]
    async fn run_with_busy_port_exits_with_port_code() {
        let _lock = config::ENV_MUTEX.lock().unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth2-pkce.toml");
        std::fs::write(&path, "[client]\nclient_id = \"abc\"\n").unwrap();

        let err = run(&args(&[
            "--config",
            path.to_str().unwrap(),
            "--port",
            &port,
            "--no-browser",
        ]))
        .await
        .unwrap_err();

        assert_eq!(err.downcast_ref::<Error>().unwrap().exit_code(), 3);
    }
}
