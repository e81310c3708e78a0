//! Unified error type for Parley.

use parley_session::SessionError;
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A session-level error (capacity, lifecycle).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Local I/O failed (terminal input or output).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
