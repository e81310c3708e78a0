//! Membership and session lifecycle for Parley.
//!
//! This crate handles who is in the chat:
//!
//! 1. **Registry**: the shared membership table ([`Registry`]) with
//!    capacity admission and name-collision resolution
//! 2. **Session lifecycle**: the per-connection state machine
//!    ([`Session`], [`SessionState`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← drives sessions, broadcasts from registry snapshots
//!     ↕
//! Session Layer (this crate)  ← membership and lifecycle
//!     ↕
//! Protocol / Transport (below)  ← Identity, Connection, ConnectionId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{Member, Registration, Registry};
pub use session::{DEFAULT_MAX_CLIENTS, Session, SessionConfig, SessionState};
