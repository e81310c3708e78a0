//! Session types: the server's record of one connected client.
//!
//! A session tracks:
//! - WHICH connection it is (`ConnectionId`, also its registry handle)
//! - WHO the client is (`Identity`, known once registration succeeds)
//! - WHAT lifecycle state it is in
//!
//! The connection loop that drives a session lives in the `parley` crate;
//! this module only owns the state machine and the final close.

use std::sync::Arc;

use parley_protocol::Identity;
use parley_transport::Connection;

use crate::SessionError;

/// Default ceiling on simultaneously registered members.
pub const DEFAULT_MAX_CLIENTS: usize = 10;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for membership behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How many members may be registered at once. Registration beyond
    /// this fails with [`SessionError::CapacityExceeded`].
    ///
    /// Default: 10.
    pub max_clients: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// Transitions only move forward:
///
/// ```text
///   Registering ──→ Active ──→ Closing ──→ Closed
///        │                                   ↑
///        └───────(rejected / no name)────────┘
/// ```
///
/// - **Registering**: connection accepted, waiting for the proposed name.
/// - **Active**: registered; inbound lines are broadcast.
/// - **Closing**: receive loop ended; announcing departure and
///   deregistering.
/// - **Closed**: connection closed. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Registering,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Returns `true` if moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Registering, Self::Active)
                | (Self::Registering, Self::Closed)
                | (Self::Active, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single client's session on the server.
///
/// Created when a connection is accepted and dropped once it reaches
/// [`SessionState::Closed`]. The session is the only party that closes
/// its connection; the registry only ever holds send handles to it.
pub struct Session<C> {
    conn: Arc<C>,
    identity: Option<Identity>,
    state: SessionState,
}

impl<C: Connection> Session<C> {
    /// Starts a session in [`SessionState::Registering`].
    pub fn new(conn: Arc<C>) -> Self {
        Self {
            conn,
            identity: None,
            state: SessionState::Registering,
        }
    }

    /// The assigned identity, once registered.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Records the identity the registry assigned and enters `Active`.
    pub fn activate(&mut self, identity: Identity) -> Result<(), SessionError> {
        self.transition(SessionState::Active)?;
        self.identity = Some(identity);
        Ok(())
    }

    /// Enters `Closing` after the receive loop has ended.
    pub fn begin_closing(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Closing)
    }

    /// Enters `Closed` and closes the connection.
    ///
    /// A second call fails with [`SessionError::InvalidTransition`] before
    /// touching the connection, so the connection is closed at most once.
    /// A failure to close the socket itself is only logged: the peer may
    /// already be gone.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Closed)?;
        if let Err(e) = self.conn.close().await {
            tracing::debug!(
                handle = %self.conn.id(),
                error = %e,
                "closing connection failed"
            );
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(
            handle = %self.conn.id(),
            from = ?self.state,
            to = ?next,
            "session transition"
        );
        self.state = next;
        Ok(())
    }
}
