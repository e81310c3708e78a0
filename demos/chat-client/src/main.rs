//! Parley chat client binary.
//!
//! # Usage
//!
//! ```bash
//! chat-client 127.0.0.1 8080
//! chat-client 127.0.0.1 8080 --name alice
//! ```
//!
//! Type lines to chat; `/quit` (or end of input) leaves.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use parley::parse_port;
use parley::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Parley chat client
#[derive(Parser, Debug)]
#[command(name = "chat-client")]
#[command(about = "Connect to a Parley chat server")]
#[command(version)]
struct Args {
    /// Server IP address
    server_ip: IpAddr,

    /// Server port (1-65535)
    #[arg(value_parser = parse_port)]
    server_port: u16,

    /// Display name; prompted for when omitted
    #[arg(short, long)]
    name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    parley::init_logging(&args.log_level);

    let exit = block_on_detached(chat(args))??;
    tracing::debug!(?exit, "client finished");
    Ok(())
}

async fn chat(args: Args) -> Result<ClientExit, ParleyError> {
    let addr = SocketAddr::new(args.server_ip, args.server_port);
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    let name = match args.name {
        Some(name) => name,
        None => {
            stdout.write_all(b"Enter your username: ").await?;
            stdout.flush().await?;
            let mut line = String::new();
            stdin.read_line(&mut line).await?;
            line
        }
    };

    let client = ChatClient::connect(&addr.to_string(), &name).await?;
    stdout
        .write_all(b"Connected. Type /quit to exit.\n")
        .await?;
    stdout.flush().await?;

    run_client(client, stdin, stdout).await
}

/// Runs `future` on a fresh runtime, then shuts the runtime down without
/// waiting for blocking work.
///
/// Tokio reads stdin on a blocking thread. A read abandoned because the
/// server hung up stays parked there until the user presses enter, and an
/// ordinary runtime drop would wait for it.
fn block_on_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn test_block_on_detached_does_not_wait_for_blocking_reads() {
        let started = Instant::now();

        let value = block_on_detached(async {
            // Stands in for a stdin read nobody will ever finish.
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)));
            7
        })
        .expect("runtime should start");

        assert_eq!(value, 7);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_args_parse_positionals_and_name() {
        let args = Args::try_parse_from(["chat-client", "127.0.0.1", "9000", "--name", "alice"])
            .expect("valid arguments");

        assert_eq!(args.server_port, 9000);
        assert_eq!(args.name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_args_reject_bad_port() {
        assert!(Args::try_parse_from(["chat-client", "127.0.0.1", "0"]).is_err());
        assert!(Args::try_parse_from(["chat-client", "127.0.0.1", "http"]).is_err());
    }
}
