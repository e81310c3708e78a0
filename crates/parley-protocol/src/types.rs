//! Core protocol types: who is speaking, and what the server says.
//!
//! Parley has no structured wire format. Everything that travels is a line
//! of human-readable text, so the "types" here are the names that tag those
//! lines and the fixed sentences the server emits.

use std::fmt;

use crate::ProtocolError;

/// Name given to a client whose proposed name is blank.
pub const ANONYMOUS: &str = "Anonymous";

/// Name the client sends when the user leaves the prompt empty.
pub const GUEST: &str = "Guest";

/// The only command the client recognizes. Matched exactly after trimming.
pub const QUIT_COMMAND: &str = "/quit";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A display name, unique among live members at any instant.
///
/// Construct it with [`Identity::parse`] (strict) or
/// [`Identity::from_proposal`] (falls back to [`ANONYMOUS`]). Once a
/// session has registered, its identity never changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    /// Parses a proposed name.
    ///
    /// Trailing whitespace is trimmed. The result must be non-empty and
    /// free of control characters, since it is echoed inside every line
    /// the member sends.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let name = raw.trim_end();
        if name.trim_start().is_empty() {
            return Err(ProtocolError::EmptyIdentity);
        }
        if name.chars().any(char::is_control) {
            return Err(ProtocolError::InvalidIdentity(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Parses a proposed name, substituting [`ANONYMOUS`] for anything
    /// [`Identity::parse`] rejects.
    pub fn from_proposal(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|_| Self::anonymous())
    }

    /// The fallback identity for clients that sent no usable name.
    pub fn anonymous() -> Self {
        Self(ANONYMOUS.to_string())
    }

    /// Returns `"{self}_{n}"`, the `n`th collision candidate for this name.
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}_{n}", self.0))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Notice: every sentence the server writes
// ---------------------------------------------------------------------------

/// A line the server sends to clients.
///
/// `Display` renders the text without a line terminator; use
/// [`Notice::to_wire`] to get the framed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice<'a> {
    /// Sent only to the member who just registered.
    Welcome(&'a Identity),
    /// Broadcast to everyone else when a member registers.
    Joined(&'a Identity),
    /// Broadcast to everyone else when a member's session ends.
    Left(&'a Identity),
    /// An ordinary chat line, tagged with its sender.
    Chat {
        /// Who said it.
        from: &'a Identity,
        /// What they said, already trimmed.
        text: &'a str,
    },
    /// Sent to a connection turned away at capacity.
    ServerFull,
}

impl Notice<'_> {
    /// Renders the notice as one newline-terminated line.
    pub fn to_wire(&self) -> Vec<u8> {
        crate::frame_line(&self.to_string())
    }
}

impl fmt::Display for Notice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome(who) => write!(f, "Welcome, {who}!"),
            Self::Joined(who) => write!(f, "{who} has joined the chat."),
            Self::Left(who) => write!(f, "{who} has left the chat."),
            Self::Chat { from, text } => write!(f, "[{from}]: {text}"),
            Self::ServerFull => f.write_str("Server full."),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientInput: what the local user typed
// ---------------------------------------------------------------------------

/// Classification of one line typed into the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    /// The user asked to leave.
    Quit,
    /// Nothing worth sending.
    Empty,
    /// A chat line to send, trimmed.
    Line(String),
}

impl ClientInput {
    /// Classifies a raw input line.
    pub fn parse(raw: &str) -> Self {
        let line = raw.trim_end();
        if line.trim_start() == QUIT_COMMAND {
            Self::Quit
        } else if line.trim_start().is_empty() {
            Self::Empty
        } else {
            Self::Line(line.to_string())
        }
    }
}
