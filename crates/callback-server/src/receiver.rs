//! Single-shot loopback callback server
//!
//! The axum server runs on a spawned task. The handler and the waiting
//! caller share exactly one primitive: a capacity-one oneshot channel whose
//! sender sits behind `OutcomeSlot`. The first redirect carrying `code` or
//! `error` takes the sender; every later redirect gets a 409 and publishes
//! nothing.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::state::{ReceiverEvent, ReceiverState, handle_event};

/// Grace period for in-flight handlers during `stop()` before the server
/// task is aborted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Authorization code captured from the redirect, with the echoed `state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    /// `None` when the provider omitted the parameter.
    pub state: Option<String>,
}

/// The one value that crosses from the handler to the waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(AuthorizationCode),
    ProviderError { code: String, description: String },
    Transport(String),
}

/// Guarded single-fire sender. `deliver` returns `false` once the slot has
/// fired, so duplicate redirects can never block or panic a handler.
#[derive(Clone)]
struct OutcomeSlot(Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>);

impl OutcomeSlot {
    fn new() -> (Self, oneshot::Receiver<CallbackOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self(Arc::new(Mutex::new(Some(tx)))), rx)
    }

    fn deliver(&self, outcome: CallbackOutcome) -> bool {
        let sender = lock(&self.0).take();
        match sender {
            Some(tx) => {
                // The waiting side may already be gone; the slot is spent either way
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Query parameters the provider may append to the redirect URI.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Handle to the running server task.
struct Running {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Local HTTP listener that receives exactly one OAuth redirect.
///
/// Dropping the server without calling `stop()` still signals the axum
/// server to shut down; the task then finishes on its own.
pub struct CallbackServer {
    addr: SocketAddr,
    path: String,
    state: Mutex<ReceiverState>,
    outcome_rx: tokio::sync::Mutex<Option<oneshot::Receiver<CallbackOutcome>>>,
    running: Mutex<Option<Running>>,
}

impl CallbackServer {
    /// Bind `127.0.0.1:port` and start serving `path` on a background task.
    ///
    /// Only the IPv4 loopback is bound, while `redirect_uri()` names
    /// `localhost`. Browsers that resolve `localhost` to `::1` first fall
    /// back to `127.0.0.1` when nothing listens there.
    ///
    /// Port 0 binds an ephemeral port; read it back via `local_addr()` or
    /// `redirect_uri()`. Fails fast with `PortUnavailable` if the port cannot
    /// be bound. The caller decides whether to try another port.
    pub async fn start(port: u16, path: &str) -> Result<Self> {
        validate_path(path)?;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| Error::PortUnavailable {
                port,
                reason: e.to_string(),
            })?;
        let addr = listener.local_addr().map_err(|e| Error::PortUnavailable {
            port,
            reason: e.to_string(),
        })?;

        let (slot, outcome_rx) = OutcomeSlot::new();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = build_router(path, slot.clone());

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    // Resolves on stop() or when the server handle is dropped
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "callback listener failed");
                slot.deliver(CallbackOutcome::Transport(e.to_string()));
            }
        });

        let server = Self {
            addr,
            path: path.to_owned(),
            state: Mutex::new(ReceiverState::Idle),
            outcome_rx: tokio::sync::Mutex::new(Some(outcome_rx)),
            running: Mutex::new(Some(Running { shutdown_tx, task })),
        };
        server.transition(ReceiverEvent::Bound { addr });
        info!(addr = %addr, path, "callback server listening");

        Ok(server)
    }

    /// Suspend until the redirect arrives, the listener fails, or `timeout`
    /// elapses.
    ///
    /// The deadline covers waiting behind another caller, so concurrent
    /// waiters each return within their own `timeout`. A timeout leaves the
    /// listener running, so the caller may wait again or `stop()`. Once an
    /// outcome has been returned, later calls yield `OutcomeConsumed`.
    /// Dropping the returned future is safe.
    pub async fn wait_for_outcome(&self, timeout: Duration) -> Result<AuthorizationCode> {
        let waited = tokio::time::timeout(timeout, async {
            let mut guard = self.outcome_rx.lock().await;
            let rx = guard.as_mut()?;
            let received = rx.await;
            *guard = None;
            Some(received)
        })
        .await;

        let received = match waited {
            Ok(Some(received)) => received,
            Ok(None) => return Err(Error::OutcomeConsumed),
            Err(_) => {
                self.transition(ReceiverEvent::DeadlineElapsed);
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "no authorization redirect before deadline"
                );
                return Err(Error::Timeout(timeout));
            }
        };

        match received {
            Ok(CallbackOutcome::Code(code)) => {
                self.transition(ReceiverEvent::CodeDelivered);
                Ok(code)
            }
            Ok(CallbackOutcome::ProviderError { code, description }) => {
                self.transition(ReceiverEvent::ErrorDelivered);
                Err(Error::ProviderError { code, description })
            }
            Ok(CallbackOutcome::Transport(message)) => {
                self.transition(ReceiverEvent::ListenerFailed);
                Err(Error::Transport(message))
            }
            Err(_) => {
                self.transition(ReceiverEvent::ListenerFailed);
                Err(Error::Transport(
                    "callback listener stopped before an outcome was delivered".into(),
                ))
            }
        }
    }

    /// Gracefully stop the server.
    ///
    /// Idempotent and safe to call concurrently: only the first call does the
    /// work, later calls return immediately. In-flight handlers get
    /// `SHUTDOWN_GRACE` to finish before the task is aborted.
    pub async fn stop(&self) {
        let running = lock(&self.running).take();
        let Some(Running { shutdown_tx, task }) = running else {
            debug!("callback server already stopped");
            return;
        };

        debug!(addr = %self.addr, "stopping callback server");
        let _ = shutdown_tx.send(());

        let abort = task.abort_handle();
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => debug!("callback server stopped"),
            Ok(Err(e)) => warn!(error = %e, "callback server task ended abnormally"),
            Err(_) => {
                warn!(
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "callback handlers still running after grace period, aborting"
                );
                abort.abort();
            }
        }

        self.transition(ReceiverEvent::StopRequested);
    }

    /// Redirect URI to register with the provider: `http://localhost:{port}{path}`.
    ///
    /// Providers match the registered host literally, so this stays
    /// `localhost` even though the listener sits on `127.0.0.1`.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.addr.port(), self.path)
    }

    /// Bound socket address (useful when started on port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReceiverState {
        lock(&self.state).clone()
    }

    fn transition(&self, event: ReceiverEvent) {
        let mut state = lock(&self.state);
        let current = std::mem::replace(&mut *state, ReceiverState::Idle);
        *state = handle_event(current, event);
        debug!(state = ?*state, "callback receiver transition");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// axum 0.8 panics on malformed route paths, so reject them up front.
fn validate_path(path: &str) -> Result<()> {
    let valid = path.starts_with('/')
        && !path.contains(['{', '}', '?', '#'])
        && !path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPath(path.to_owned()))
    }
}

fn build_router(path: &str, slot: OutcomeSlot) -> Router {
    Router::new()
        .route(path, get(handle_callback))
        .with_state(slot)
}

/// GET {path}: the provider's redirect target.
///
/// `error` is checked before `code`: a redirect carrying both is a failure.
/// A request with neither parameter gets a 400 and leaves the slot armed.
async fn handle_callback(
    State(slot): State<OutcomeSlot>,
    Query(params): Query<CallbackParams>,
) -> Response {
    debug!(
        has_code = params.code.is_some(),
        has_state = params.state.is_some(),
        has_error = params.error.is_some(),
        "received callback request"
    );

    if let Some(code) = params.error.filter(|e| !e.is_empty()) {
        let description = params.error_description.unwrap_or_default();
        let body = format!("OAuth error: {code} - {description}");
        if !slot.deliver(CallbackOutcome::ProviderError {
            code: code.clone(),
            description,
        }) {
            return already_handled();
        }
        warn!(error = %code, "authorization server redirected with an error");
        return (StatusCode::BAD_REQUEST, body).into_response();
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!("callback request carried no authorization code");
        return (StatusCode::BAD_REQUEST, "No authorization code received").into_response();
    };

    let page = success_page(&code);
    if !slot.deliver(CallbackOutcome::Code(AuthorizationCode {
        code,
        state: params.state,
    })) {
        return already_handled();
    }
    info!("authorization code received");

    Html(page).into_response()
}

fn already_handled() -> Response {
    debug!("duplicate callback request ignored");
    (
        StatusCode::CONFLICT,
        "Authorization request already handled",
    )
        .into_response()
}

fn success_page(code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Authorization Successful</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 0 auto; padding: 40px 20px; text-align: center; }}
        h1 {{ color: #2e7d32; }}
        code {{ display: block; background: #f5f5f5; padding: 10px; border-radius: 4px; word-break: break-all; }}
    </style>
</head>
<body>
    <h1>Authorization Successful</h1>
    <p>You can close this window and return to the terminal.</p>
    <p>Authorization code:</p>
    <code>{}</code>
</body>
</html>
"#,
        escape_html(code)
    )
}

/// The code is attacker-controllable input reflected into HTML.
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
