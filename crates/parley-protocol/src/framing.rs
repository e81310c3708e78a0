//! Line framing: turning received byte chunks into lines and back.
//!
//! A receive returns whatever bytes the transport had ready, up to its
//! buffer size. The server treats each chunk on its own (no reassembly
//! across receives) but splits it on `\n`, so two lines that arrive in one
//! read are still two messages. The client, which always receives
//! newline-terminated lines from the server, reassembles with
//! [`LineBuffer`].

/// Strips trailing CR, LF, and whitespace.
pub fn trim_line(line: &str) -> &str {
    line.trim_end()
}

/// Splits one received chunk into trimmed, non-empty lines.
///
/// Invalid UTF-8 is replaced rather than rejected; the server relays text
/// and has no reason to drop a whole chunk over one bad byte.
pub fn split_lines(payload: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(payload)
        .split('\n')
        .map(trim_line)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits the first chunk a client sends into its proposed name and any
/// chat lines that arrived in the same read.
///
/// The name is the first `\n`-separated segment even when that segment is
/// blank, so `"\nhello\n"` proposes an empty name and carries one chat
/// line. Only the remainder is filtered like [`split_lines`].
pub fn split_handshake(payload: &[u8]) -> (String, Vec<String>) {
    let text = String::from_utf8_lossy(payload);
    match text.split_once('\n') {
        Some((name, rest)) => (
            trim_line(name).to_string(),
            split_lines(rest.as_bytes()),
        ),
        None => (trim_line(&text).to_string(), Vec::new()),
    }
}

/// Encodes one line for the wire, appending the `\n` terminator.
pub fn frame_line(line: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    bytes
}

/// Accumulates received bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a received chunk.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Pops the next complete line, trimmed. Returns `None` until a `\n`
    /// has arrived.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(trim_line(&String::from_utf8_lossy(&line)).to_string())
    }

    /// Takes whatever unterminated text is left, e.g. after the peer
    /// closed mid-line.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(trim_line(&String::from_utf8_lossy(&rest)).to_string())
    }
}
