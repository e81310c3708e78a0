//! Per-connection handler: name handshake, message loop, and teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow follows the session state machine:
//!   1. Registering: receive the proposed name → register (or reject)
//!   2. Active: welcome the client, announce the join, relay every line
//!   3. Closing: announce the departure, deregister
//!   4. Closed: flush the outbound queue, close the connection
//!
//! The handler never writes to the socket itself. Every line goes through
//! the connection's [`Outbox`](crate::Outbox) so the writer task can keep
//! the welcome ahead of anything broadcast in the meantime.

use std::sync::Arc;

use parley_protocol::{Identity, Notice, split_handshake, split_lines};
use parley_session::{Registry, Session, SessionError};
use parley_transport::{Connection, ConnectionId};

use crate::ParleyError;
use crate::outbox::{OUTBOX_CAPACITY, Outbox, spawn_writer};
use crate::server::ServerState;

/// Drop guard that deregisters a member if its handler never reaches the
/// normal teardown, e.g. because the task panicked.
///
/// `Drop` is synchronous, so the async deregister runs in a fire-and-forget
/// task. Deregistering an absent handle is a no-op, so a late guard can
/// never evict anyone else.
struct RegistrationGuard {
    handle: ConnectionId,
    registry: Arc<Registry<Outbox>>,
    armed: bool,
}

impl RegistrationGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let handle = self.handle;
        let registry = Arc::clone(&self.registry);
        runtime.spawn(async move {
            if registry.deregister(handle).await.is_some() {
                tracing::warn!(%handle, "session aborted, registration removed");
            }
        });
    }
}

/// Handles a single connection from accept to close.
///
/// Everything a client can do (hang up early, reset the socket, stop
/// reading, send garbage) ends at most this session. Errors returned here
/// are lifecycle bugs, which the accept loop logs.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    state: Arc<ServerState>,
) -> Result<(), ParleyError> {
    let conn = Arc::new(conn);
    let handle = conn.id();
    let mut session = Session::new(Arc::clone(&conn));
    tracing::debug!(%handle, "handling new connection");

    // --- Registering ---
    let first = match conn.recv().await {
        Ok(Some(chunk)) => chunk,
        Ok(None) => {
            tracing::debug!(%handle, "closed before sending a name");
            session.close().await?;
            return Ok(());
        }
        Err(e) => {
            tracing::debug!(%handle, error = %e, "recv error before name");
            session.close().await?;
            return Ok(());
        }
    };

    // The first line is the name, even if blank. Anything after it arrived
    // in the same read and is ordinary chat.
    let (name, backlog) = split_handshake(&first);
    let proposed = Identity::from_proposal(&name);

    let (outbox, mut writer) = spawn_writer(Arc::clone(&conn), OUTBOX_CAPACITY);
    let registration = match state.registry.register(handle, proposed, outbox).await {
        Ok(registration) => registration,
        Err(SessionError::CapacityExceeded { .. }) => {
            writer.greet(Notice::ServerFull.to_wire().into());
            writer.finish().await;
            session.close().await?;
            return Ok(());
        }
        Err(e) => {
            writer.finish().await;
            session.close().await?;
            return Err(e.into());
        }
    };

    let mut guard = RegistrationGuard {
        handle,
        registry: Arc::clone(&state.registry),
        armed: true,
    };
    let identity = registration.identity;
    session.activate(identity.clone())?;

    // --- Active ---
    tracing::info!(%handle, %identity, "user connected");

    writer.greet(Notice::Welcome(&identity).to_wire().into());
    state
        .broadcaster
        .broadcast(Notice::Joined(&identity), Some(handle))
        .await;

    for line in &backlog {
        relay(&state, &identity, handle, line).await;
    }

    loop {
        match conn.recv().await {
            Ok(Some(chunk)) => {
                for line in split_lines(&chunk) {
                    relay(&state, &identity, handle, &line).await;
                }
            }
            Ok(None) => {
                tracing::debug!(%handle, %identity, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%handle, %identity, error = %e, "recv error");
                break;
            }
        }
    }

    // --- Closing ---
    session.begin_closing()?;
    tracing::info!(%handle, %identity, "user disconnected");

    state
        .broadcaster
        .broadcast(Notice::Left(&identity), Some(handle))
        .await;
    state.registry.deregister(handle).await;
    guard.disarm();

    // --- Closed ---
    writer.finish().await;
    session.close().await?;
    Ok(())
}

/// Broadcasts one chat line from `from` to everyone else.
async fn relay(
    state: &ServerState,
    from: &Identity,
    handle: ConnectionId,
    text: &str,
) {
    tracing::debug!(%handle, identity = %from, message = text, "message received");
    let delivered = state
        .broadcaster
        .broadcast(Notice::Chat { from, text }, Some(handle))
        .await;
    tracing::trace!(%handle, delivered, "message relayed");
}
