//! Local OAuth redirect receiver
//!
//! Binds a loopback HTTP listener that serves exactly one callback route and
//! hands the first authorization outcome (code or provider error) to a single
//! waiting caller. Used by `pkce-auth` during the browser leg of the
//! authorization code flow.
//!
//! Lifecycle:
//! 1. `CallbackServer::start()` binds the port and spawns the axum server
//! 2. The browser is redirected to `CallbackServer::redirect_uri()`
//! 3. `CallbackServer::wait_for_outcome()` suspends until the redirect arrives
//!    or the deadline passes
//! 4. `CallbackServer::stop()` drains in-flight requests and closes the listener

pub mod error;
pub mod receiver;
pub mod state;

pub use error::{Error, Result};
pub use receiver::{AuthorizationCode, CallbackOutcome, CallbackServer, SHUTDOWN_GRACE};
pub use state::{ReceiverEvent, ReceiverState, handle_event};
