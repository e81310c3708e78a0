//! Client side of the protocol: send lines, receive lines, half-close on
//! quit.
//!
//! [`ChatClient`] is the connection-level API. [`run_client`] wires it to
//! an input source and an output sink the way the terminal client does:
//!
//! ```text
//!   input lines ──→ send loop ──→ server
//!                                   │
//!   output  ←── reader task  ←──────┘
//! ```
//!
//! Quitting never closes the socket outright. The send loop half-closes
//! its write direction; the server sees end-of-stream, runs its teardown,
//! and closes its side, which is what wakes the reader task.

use std::sync::Arc;

use parley_protocol::{ClientInput, GUEST, LineBuffer, frame_line};
use parley_transport::{Connection, TcpConnection};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::ParleyError;

/// Printed when the server closes the connection.
pub const SERVER_DISCONNECTED: &str = "Server disconnected.";

/// Why [`run_client`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The user typed `/quit`.
    Quit,
    /// The input source reached end-of-file.
    InputClosed,
    /// The server closed the connection first.
    ServerClosed,
}

/// A connected, named chat client.
pub struct ChatClient {
    conn: TcpConnection,
    incoming: Mutex<LineBuffer>,
}

impl ChatClient {
    /// Connects to `addr` and sends `name` as the first line.
    ///
    /// An empty name is sent as [`GUEST`]. The server may still assign a
    /// different name if this one is taken; its welcome line says which.
    pub async fn connect(addr: &str, name: &str) -> Result<Self, ParleyError> {
        let conn = TcpConnection::connect(addr).await?;
        let name = match name.trim() {
            "" => GUEST,
            name => name,
        };
        conn.send(&frame_line(name)).await?;
        tracing::debug!(id = %conn.id(), %addr, name, "connected");

        Ok(Self {
            conn,
            incoming: Mutex::new(LineBuffer::new()),
        })
    }

    /// Sends one chat line.
    pub async fn send_line(&self, line: &str) -> Result<(), ParleyError> {
        self.conn.send(&frame_line(line)).await?;
        Ok(())
    }

    /// Receives the next line from the server.
    ///
    /// Returns `Ok(None)` once the server has closed the connection and
    /// every buffered line has been returned.
    pub async fn recv_line(&self) -> Result<Option<String>, ParleyError> {
        let mut incoming = self.incoming.lock().await;
        loop {
            if let Some(line) = incoming.next_line() {
                return Ok(Some(line));
            }
            match self.conn.recv().await? {
                Some(chunk) => incoming.extend(&chunk),
                None => return Ok(incoming.take_remainder()),
            }
        }
    }

    /// Half-closes the write direction. Receiving keeps working until the
    /// server closes its side.
    pub async fn quit(&self) -> Result<(), ParleyError> {
        self.conn.shutdown_write().await?;
        Ok(())
    }
}

/// Runs an interactive session until the user quits, input ends, or the
/// server goes away.
///
/// Every line from the server is written to `output`, followed by
/// [`SERVER_DISCONNECTED`] once the server closes. Lines from `input` are
/// classified with [`ClientInput`]: blanks are skipped, `/quit` ends the
/// loop, everything else is sent.
pub async fn run_client<R, W>(
    client: ChatClient,
    input: R,
    output: W,
) -> Result<ClientExit, ParleyError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let client = Arc::new(client);
    let mut reader = tokio::spawn(forward_incoming(Arc::clone(&client), output));
    let mut lines = input.lines();

    let exit = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(raw)) => match ClientInput::parse(&raw) {
                    ClientInput::Quit => break ClientExit::Quit,
                    ClientInput::Empty => continue,
                    ClientInput::Line(text) => {
                        if let Err(e) = client.send_line(&text).await {
                            tracing::warn!(error = %e, "send failed");
                            break ClientExit::ServerClosed;
                        }
                    }
                },
                Ok(None) => break ClientExit::InputClosed,
                Err(e) => {
                    tracing::warn!(error = %e, "input error");
                    break ClientExit::InputClosed;
                }
            },
            result = &mut reader => {
                report_reader(result);
                return Ok(ClientExit::ServerClosed);
            }
        }
    };

    // Half-close so the server tears down and closes its side, which ends
    // the reader task with a clean end-of-stream.
    if let Err(e) = client.quit().await {
        tracing::debug!(error = %e, "half-close failed");
    }
    report_reader(reader.await);
    Ok(exit)
}

/// Copies server lines to `output` until the server closes.
async fn forward_incoming<W>(
    client: Arc<ChatClient>,
    mut output: W,
) -> Result<(), ParleyError>
where
    W: AsyncWrite + Unpin,
{
    let result = async {
        while let Some(line) = client.recv_line().await? {
            output.write_all(frame_line(&line).as_slice()).await?;
            output.flush().await?;
        }
        Ok::<_, ParleyError>(())
    }
    .await;

    output
        .write_all(frame_line(SERVER_DISCONNECTED).as_slice())
        .await?;
    output.flush().await?;
    result
}

fn report_reader(
    result: Result<Result<(), ParleyError>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "receive loop ended with error"),
        Err(e) => tracing::warn!(error = %e, "receive task failed"),
    }
}
