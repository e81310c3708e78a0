//! Parley chat server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:8080 (or $PORT if set)
//! chat-server
//!
//! # Explicit port and a smaller room
//! chat-server --port 9000 --max-clients 4
//! ```

use clap::Parser;
use parley::prelude::*;
use parley::{DEFAULT_BUFFER_SIZE, DEFAULT_HOST, DEFAULT_MAX_CLIENTS, parse_port};

/// Parley chat server
#[derive(Parser, Debug)]
#[command(name = "chat-server")]
#[command(about = "Multi-client line-oriented chat server")]
#[command(version)]
struct Args {
    /// Interface to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on (overrides $PORT)
    #[arg(short, long, value_parser = parse_port)]
    port: Option<u16>,

    /// Maximum simultaneously connected clients
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Maximum bytes read per receive
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    parley::init_logging(&args.log_level);

    let mut config = ServerConfig::from_env();
    config.host = args.host;
    config.max_clients = args.max_clients;
    config.buffer_size = args.buffer_size;
    if let Some(port) = args.port {
        config.port = port;
    }

    let server = ParleyServerBuilder::from_config(&config).build().await?;
    tracing::info!(
        addr = %server.local_addr()?,
        max_clients = config.max_clients,
        "server started"
    );

    server.run().await?;
    Ok(())
}
