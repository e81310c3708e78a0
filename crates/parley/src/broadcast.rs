//! Fan-out of one line to every member but the sender.

use std::fmt;
use std::sync::Arc;

use parley_protocol::frame_line;
use parley_session::Registry;
use parley_transport::ConnectionId;

use crate::outbox::{Line, Outbox};

/// Delivers lines to all registered members except an excluded one.
///
/// Delivery is best-effort. A line is pushed onto each member's outbound
/// queue without waiting; a full or closed queue is logged and skipped. It
/// neither stops delivery to the rest nor removes that member. Only a
/// member's own receive loop decides that it is gone.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Registry<Outbox>>,
}

impl Broadcaster {
    /// Creates a broadcaster over the given registry.
    pub fn new(registry: Arc<Registry<Outbox>>) -> Self {
        Self { registry }
    }

    /// Queues `message` as one line for every member whose handle is not
    /// `excluded`. Returns how many queues accepted it.
    ///
    /// Members are visited in arrival order from a registry snapshot; the
    /// registry lock is released before the first push. Queues are FIFO,
    /// so one sender's lines reach every peer in the order it sent them.
    pub async fn broadcast(
        &self,
        message: impl fmt::Display,
        excluded: Option<ConnectionId>,
    ) -> usize {
        let line: Line = frame_line(&message.to_string()).into();
        let members = self.registry.snapshot().await;

        let mut delivered = 0;
        for member in members.iter().filter(|m| Some(m.handle) != excluded) {
            match member.peer.push(Arc::clone(&line)) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        peer = %member.handle,
                        identity = %member.identity,
                        error = %e,
                        "broadcast to peer skipped"
                    );
                }
            }
        }
        delivered
    }
}
