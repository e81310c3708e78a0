//! Error types for the session layer.

use parley_transport::ConnectionId;

use crate::SessionState;

/// Errors that can occur during registration and session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The registry already holds its maximum number of members.
    /// The caller must turn the connection away without admitting it.
    #[error("server full ({max} members)")]
    CapacityExceeded {
        /// The configured ceiling that was hit.
        max: usize,
    },

    /// The handle is already registered. Each connection registers once.
    #[error("{0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// A lifecycle transition that the state machine does not allow,
    /// e.g. closing a session twice.
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// State that was requested.
        to: SessionState,
    },
}
