//! TCP transport implementation using `tokio::net`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{
    Connection, ConnectionId, DEFAULT_BUFFER_SIZE, Transport, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP-based [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    buffer_size: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            buffer_size: DEFAULT_BUFFER_SIZE,
        })
    }

    /// Sets the per-receive buffer size for accepted connections.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream, self.buffer_size);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single TCP connection.
///
/// The stream is split so a reader blocked in [`Connection::recv`] never
/// stalls writers. The write half sits in an `Option` so
/// [`Connection::close`] can drop it exactly once.
pub struct TcpConnection {
    id: ConnectionId,
    buffer_size: usize,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl TcpConnection {
    /// Connects to a listening Parley server.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        Ok(Self::from_stream(stream, DEFAULT_BUFFER_SIZE))
    }

    fn from_stream(stream: TcpStream, buffer_size: usize) -> Self {
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        let (reader, writer) = stream.into_split();
        Self {
            id,
            buffer_size,
            reader: Mutex::new(reader),
            writer: Mutex::new(Some(writer)),
        }
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        let Some(half) = writer.as_mut() else {
            return Err(TransportError::ConnectionClosed(format!(
                "{} already closed",
                self.id
            )));
        };
        half.write_all(data).await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let mut buf = vec![0u8; self.buffer_size];
        match reader.read(&mut buf).await {
            Ok(0) => Ok(None),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(e) => Err(TransportError::ReceiveFailed(e)),
        }
    }

    async fn shutdown_write(&self) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(half) => shutdown(half).await,
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let half = self.writer.lock().await.take();
        match half {
            Some(mut half) => shutdown(&mut half).await,
            None => Ok(()),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Shuts down the write direction. A peer that already vanished is not
/// an error: there is nobody left to signal.
async fn shutdown(half: &mut OwnedWriteHalf) -> Result<(), TransportError> {
    match half.shutdown().await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
        Err(e) => Err(TransportError::ShutdownFailed(e)),
    }
}
