//! Receiver lifecycle state machine
//!
//! Pure state machine: receives events, returns the new state.
//! `CallbackServer` owns the current state and feeds it the events implied
//! by binding, outcome delivery, deadlines and shutdown.

use std::net::SocketAddr;

/// Lifecycle states of the callback receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverState {
    /// Constructed, listener not bound yet
    Idle,
    /// Listener bound, waiting for the browser redirect
    Listening { addr: SocketAddr },
    /// The authorization code was handed to the caller
    CodeReceived,
    /// The provider redirected with an `error` parameter
    ErrorReceived,
    /// The caller's deadline elapsed before any outcome arrived.
    /// The listener is still up; a later wait may still see an outcome.
    TimedOut,
    /// The listener task failed or vanished before delivering an outcome
    TransportFailed,
    /// Terminal state
    Stopped,
}

/// Events that drive receiver transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// TCP listener bound on `addr`
    Bound { addr: SocketAddr },
    /// A redirect carrying `code` was taken from the handoff slot
    CodeDelivered,
    /// A redirect carrying `error` was taken from the handoff slot
    ErrorDelivered,
    /// `wait_for_outcome` deadline passed
    DeadlineElapsed,
    /// The server task ended without delivering an outcome
    ListenerFailed,
    /// `stop()` was called
    StopRequested,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: ReceiverState, event: ReceiverEvent) -> ReceiverState {
    match (state, event) {
        // --- Idle ---
        (ReceiverState::Idle, ReceiverEvent::Bound { addr }) => ReceiverState::Listening { addr },

        // --- Listening / TimedOut: an outcome may still arrive ---
        (
            ReceiverState::Listening { .. } | ReceiverState::TimedOut,
            ReceiverEvent::CodeDelivered,
        ) => ReceiverState::CodeReceived,

        (
            ReceiverState::Listening { .. } | ReceiverState::TimedOut,
            ReceiverEvent::ErrorDelivered,
        ) => ReceiverState::ErrorReceived,

        (
            ReceiverState::Listening { .. } | ReceiverState::TimedOut,
            ReceiverEvent::DeadlineElapsed,
        ) => ReceiverState::TimedOut,

        (
            ReceiverState::Listening { .. } | ReceiverState::TimedOut,
            ReceiverEvent::ListenerFailed,
        ) => ReceiverState::TransportFailed,

        // --- Any state + stop = stopped ---
        (_, ReceiverEvent::StopRequested) => ReceiverState::Stopped,

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => state,
    }
}
