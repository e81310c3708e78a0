//! Error types for the protocol layer.
//!
//! Each crate in Parley defines its own error enum. A `ProtocolError`
//! means the problem is in the text a peer sent, not in networking or
//! membership.

/// Errors that can occur in the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The proposed display name was empty after trimming.
    #[error("identity is empty")]
    EmptyIdentity,

    /// The proposed display name contains characters that would break
    /// line framing (newlines or other control characters).
    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),
}
