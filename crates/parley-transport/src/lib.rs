//! Transport abstraction layer for Parley.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! stream transports, plus a TCP implementation.
//!
//! # Feature Flags
//!
//! - `tcp` (default): TCP transport via `tokio::net`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Maximum number of bytes returned by a single [`Connection::recv`] call
/// unless a transport is configured otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Opaque identifier for a connection.
///
/// Identifiers are handed out in accept order, so ordering by
/// `ConnectionId` is ordering by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A single duplex connection that can send and receive bytes.
///
/// Every method takes `&self` so a connection can be shared behind an
/// `Arc` between the task reading from it and the tasks writing to it.
/// The returned futures are `Send` so generic callers can be spawned.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends data to the remote peer.
    ///
    /// Concurrent calls never interleave their bytes.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next chunk of bytes from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer has closed its write direction.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Half-closes the connection: shuts down the outbound direction only.
    ///
    /// The peer's pending `recv` observes end-of-stream, while this side can
    /// still receive whatever the peer sends afterwards.
    fn shutdown_write(
        &self,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Closes the connection. Further sends fail.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_orders_by_arrival() {
        let mut ids = vec![
            ConnectionId::new(3),
            ConnectionId::new(1),
            ConnectionId::new(2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                ConnectionId::new(1),
                ConnectionId::new(2),
                ConnectionId::new(3)
            ]
        );
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
