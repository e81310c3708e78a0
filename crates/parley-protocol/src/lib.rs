//! Wire protocol for Parley.
//!
//! This crate defines the "language" that clients and the server speak.
//! It is deliberately thin: the wire carries plain text lines, nothing
//! structured.
//!
//! - **Types** ([`Identity`], [`Notice`], [`ClientInput`]): who is
//!   speaking and the fixed sentences the server emits.
//! - **Framing** ([`split_lines`], [`split_handshake`], [`frame_line`],
//!   [`LineBuffer`]): how received chunks become lines and lines become
//!   bytes.
//! - **Errors** ([`ProtocolError`]): what a peer can get wrong.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (lines, identities) → Session (membership)
//! ```

mod error;
mod framing;
mod types;

pub use error::ProtocolError;
pub use framing::{
    LineBuffer, frame_line, split_handshake, split_lines, trim_line,
};
pub use types::{
    ANONYMOUS, ClientInput, GUEST, Identity, Notice, QUIT_COMMAND,
};
