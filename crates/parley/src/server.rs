//! `ParleyServer` builder and accept loop.
//!
//! This is the entry point for running a Parley chat server. It ties
//! together all the layers: transport → protocol → session → broadcast.

use std::sync::Arc;
use std::time::Duration;

use parley_session::{Registry, SessionConfig};
use parley_transport::{DEFAULT_BUFFER_SIZE, TcpTransport, Transport};

use crate::handler::handle_connection;
use crate::{Broadcaster, Outbox, ParleyError, ServerConfig};

/// Pause after a failed accept, so a persistent failure such as running
/// out of file descriptors does not spin the loop.
pub(crate) const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry carries its own lock; nothing else here is mutable.
pub(crate) struct ServerState {
    pub(crate) registry: Arc<Registry<Outbox>>,
    pub(crate) broadcaster: Broadcaster,
}

/// Builder for configuring and starting a Parley server.
///
/// # Example
///
/// ```rust,no_run
/// use parley::prelude::*;
///
/// # async fn run() -> Result<(), ParleyError> {
/// let server = ParleyServer::builder()
///     .bind("0.0.0.0:8080")
///     .max_clients(10)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ParleyServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    buffer_size: usize,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Creates a builder from a resolved [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            session_config: config.session_config(),
            buffer_size: config.buffer_size,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the maximum number of simultaneously registered members.
    pub fn max_clients(mut self, max_clients: usize) -> Self {
        self.session_config.max_clients = max_clients;
        self
    }

    /// Sets the per-receive buffer size.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listening socket and builds the server.
    ///
    /// Bind failure is the one fatal startup error.
    pub async fn build(self) -> Result<ParleyServer, ParleyError> {
        let transport = TcpTransport::bind(&self.bind_addr)
            .await?
            .with_buffer_size(self.buffer_size);

        let registry = Arc::new(Registry::new(&self.session_config));
        let state = Arc::new(ServerState {
            broadcaster: Broadcaster::new(Arc::clone(&registry)),
            registry,
        });

        Ok(ParleyServer { transport, state })
    }
}

impl Default for ParleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parley server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParleyServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
}

impl ParleyServer {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the live membership table.
    ///
    /// The handle stays valid after [`run()`](Self::run) consumes the
    /// server, so callers can observe membership while it serves.
    pub fn registry(&self) -> Arc<Registry<Outbox>> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns one detached task per accepted connection and never waits
    /// for any of them. Accept errors are logged and the loop continues
    /// after [`ACCEPT_BACKOFF`]; nothing a client does ends this loop.
    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), ParleyError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Parley server running");

        let state = self.state;
        accept_loop(self.transport, |conn| {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(conn, state).await {
                    tracing::debug!(error = %e, "connection ended with error");
                }
            });
        })
        .await
    }
}

/// Accepts connections forever, handing each one to `on_accept`.
async fn accept_loop<T, F>(mut transport: T, mut on_accept: F) -> Result<(), ParleyError>
where
    T: Transport,
    F: FnMut(T::Connection),
{
    loop {
        match transport.accept().await {
            Ok(conn) => on_accept(conn),
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
