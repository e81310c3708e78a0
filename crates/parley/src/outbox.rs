//! Per-member outbound queues.
//!
//! Every connection that gets past the name handshake has a bounded queue
//! and a writer task draining it into the socket. Broadcasting only pushes
//! onto queues, so a peer that stops reading fills its own queue and
//! nobody else's:
//!
//! ```text
//!   broadcaster ──push──→ [ queue ] ──→ writer task ──→ peer socket
//!   broadcaster ──push──→ [ queue ] ──→ writer task ──→ peer socket
//! ```
//!
//! The writer sends nothing until it has been given the connection's first
//! line (the welcome, or the rejection notice). Lines broadcast before that
//! wait in the queue, so they can never overtake it.

use std::sync::Arc;
use std::time::Duration;

use parley_transport::{Connection, ConnectionId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Lines that may wait in one member's queue. Further lines to that member
/// are dropped until it catches up.
pub const OUTBOX_CAPACITY: usize = 256;

/// How long teardown waits for a member's queue to drain before the writer
/// is abandoned.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// One framed line, shared by every queue it was pushed to.
pub type Line = Arc<[u8]>;

/// Why a line was not queued.
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    /// The member is not keeping up; the line was dropped.
    #[error("outbound queue for {0} is full")]
    Full(ConnectionId),

    /// The member's writer has stopped.
    #[error("writer for {0} has stopped")]
    Closed(ConnectionId),
}

/// Sending side of a member's outbound queue.
///
/// This is the handle the registry stores for each member. Cloning it is
/// cheap and every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    handle: ConnectionId,
    tx: mpsc::Sender<Line>,
}

impl Outbox {
    pub(crate) fn channel(
        handle: ConnectionId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Line>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { handle, tx }, rx)
    }

    /// Queues a line without waiting.
    pub fn push(&self, line: Line) -> Result<(), OutboxError> {
        self.tx.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => OutboxError::Full(self.handle),
            TrySendError::Closed(_) => OutboxError::Closed(self.handle),
        })
    }
}

/// The session's side of its writer task.
pub(crate) struct OutboxWriter {
    handle: ConnectionId,
    greeting: Option<oneshot::Sender<Line>>,
    task: JoinHandle<()>,
}

impl OutboxWriter {
    /// Hands the writer the connection's first line and lets it start
    /// draining the queue. Only the first call has any effect.
    pub(crate) fn greet(&mut self, line: Line) {
        if let Some(greeting) = self.greeting.take() {
            // The task only drops its receiver once it has exited.
            let _ = greeting.send(line);
        }
    }

    /// Waits for the writer to flush what is queued, up to
    /// [`DRAIN_TIMEOUT`]. The queue closes once every [`Outbox`] clone
    /// is gone, so deregister the member first.
    ///
    /// A writer that was never greeted exits without sending anything.
    pub(crate) async fn finish(mut self) {
        self.greeting = None;
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            tracing::debug!(handle = %self.handle, "outbound queue not drained, abandoning writer");
            self.task.abort();
        }
    }
}

/// Creates a member's queue and starts its writer task.
pub(crate) fn spawn_writer<C: Connection>(
    conn: Arc<C>,
    capacity: usize,
) -> (Outbox, OutboxWriter) {
    let handle = conn.id();
    let (outbox, queue) = Outbox::channel(handle, capacity);
    let (greeting, first) = oneshot::channel();
    let task = tokio::spawn(drain(conn, first, queue));

    let writer = OutboxWriter {
        handle,
        greeting: Some(greeting),
        task,
    };
    (outbox, writer)
}

async fn drain<C: Connection>(
    conn: Arc<C>,
    first: oneshot::Receiver<Line>,
    mut queue: mpsc::Receiver<Line>,
) {
    let Ok(first) = first.await else {
        return;
    };
    if !write(conn.as_ref(), &first).await {
        return;
    }
    while let Some(line) = queue.recv().await {
        if !write(conn.as_ref(), &line).await {
            return;
        }
    }
}

async fn write<C: Connection>(conn: &C, line: &[u8]) -> bool {
    match conn.send(line).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(handle = %conn.id(), error = %e, "write to peer failed, writer stopping");
            false
        }
    }
}
