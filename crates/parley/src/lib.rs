//! # Parley
//!
//! A multi-client text broadcast server.
//!
//! Clients connect over TCP, send a display name as their first line, and
//! from then on every line they send is relayed to every other connected
//! client as `[name]: text`. The server announces joins and departures,
//! keeps names unique by suffixing collisions (`alice`, `alice_1`, …), and
//! turns new connections away once a fixed membership ceiling is reached.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn run() -> Result<(), ParleyError> {
//! let config = ServerConfig::from_env();
//! let server = ParleyServerBuilder::from_config(&config).build().await?;
//! server.run().await
//! # }
//! ```

mod broadcast;
mod client;
mod config;
mod error;
mod handler;
mod logging;
mod outbox;
mod server;

pub use broadcast::Broadcaster;
pub use client::{ChatClient, ClientExit, SERVER_DISCONNECTED, run_client};
pub use config::{
    ConfigError, DEFAULT_HOST, DEFAULT_PORT, PORT_ENV, ServerConfig, parse_port,
};
pub use parley_session::DEFAULT_MAX_CLIENTS;
pub use parley_transport::DEFAULT_BUFFER_SIZE;
pub use error::ParleyError;
pub use logging::init_logging;
pub use outbox::{Line, OUTBOX_CAPACITY, Outbox, OutboxError};
pub use server::{ParleyServer, ParleyServerBuilder};

/// Everything needed to run a server or a client.
pub mod prelude {
    pub use crate::{
        ChatClient, ClientExit, Outbox, ParleyError, ParleyServer,
        ParleyServerBuilder, ServerConfig, run_client,
    };
    pub use parley_protocol::{Identity, Notice};
    pub use parley_session::{Registry, SessionConfig, SessionError};
    pub use parley_transport::{Connection, ConnectionId, TcpConnection};
}
