//! The registry: the live membership table shared by every session.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Admitting members up to a fixed ceiling
//! - Resolving display-name collisions so identities stay unique
//! - Removing members when their session ends (idempotently)
//! - Handing out point-in-time snapshots for broadcast
//!
//! # Concurrency note
//!
//! Unlike a plain map owned by one task, the registry is shared by every
//! connection task, so it owns its own lock. Every method takes the lock
//! for a single map operation (or the snapshot copy) and releases it
//! before returning. Nothing in this module performs network I/O, so the
//! lock is never held across a send or receive: callers that write to
//! members iterate over a [`Registry::snapshot`] instead.

use std::collections::BTreeMap;

use parley_protocol::Identity;
use parley_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::{SessionConfig, SessionError};

/// One live member, as seen in a [`Registry::snapshot`].
///
/// `peer` is whatever handle the server uses to reach the member, e.g. the
/// sending side of its outbound queue. The member's own session still owns
/// the lifecycle of the underlying connection.
#[derive(Debug, Clone)]
pub struct Member<P> {
    /// Registry handle (the member's connection ID).
    pub handle: ConnectionId,
    /// Assigned, collision-free display name.
    pub identity: Identity,
    /// Handle used to write to the member.
    pub peer: P,
}

/// The outcome of a successful [`Registry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Handle to pass to [`Registry::deregister`].
    pub handle: ConnectionId,
    /// The identity actually assigned. Differs from the proposal when the
    /// proposed name was taken.
    pub identity: Identity,
}

struct Entry<P> {
    identity: Identity,
    peer: P,
}

/// Shared membership table: handle → identity and peer handle.
///
/// ## Invariants
///
/// - At most `max_clients` entries at any time.
/// - No two entries share an identity string.
///
/// Entries are keyed by `ConnectionId` in a `BTreeMap`, so snapshots come
/// out in arrival order.
pub struct Registry<P> {
    members: Mutex<BTreeMap<ConnectionId, Entry<P>>>,
    max_clients: usize,
}

impl<P> Registry<P> {
    /// Creates an empty registry with the given config.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            members: Mutex::new(BTreeMap::new()),
            max_clients: config.max_clients,
        }
    }

    /// Admits a member under `handle`, resolving name collisions.
    ///
    /// If `proposed` is taken, `proposed_1`, `proposed_2`, … are tried in
    /// turn, each checked against the full membership. The check and the
    /// insert happen under one lock acquisition, so two sessions proposing
    /// the same name at the same moment still end up distinct.
    ///
    /// # Errors
    /// - [`SessionError::CapacityExceeded`]: the registry is full; nothing
    ///   was inserted.
    /// - [`SessionError::AlreadyRegistered`]: `handle` is already a member.
    pub async fn register(
        &self,
        handle: ConnectionId,
        proposed: Identity,
        peer: P,
    ) -> Result<Registration, SessionError> {
        let mut members = self.members.lock().await;

        if members.len() >= self.max_clients {
            tracing::info!(
                %handle,
                max = self.max_clients,
                "registration rejected, server full"
            );
            return Err(SessionError::CapacityExceeded {
                max: self.max_clients,
            });
        }
        if members.contains_key(&handle) {
            return Err(SessionError::AlreadyRegistered(handle));
        }

        let identity = resolve_collision(&members, &proposed);
        if identity != proposed {
            tracing::debug!(
                %handle,
                %proposed,
                assigned = %identity,
                "name taken, assigned suffixed name"
            );
        }

        members.insert(
            handle,
            Entry {
                identity: identity.clone(),
                peer,
            },
        );

        Ok(Registration { handle, identity })
    }

    /// Removes a member. Returns the identity it held, or `None` if the
    /// handle was not (or no longer) registered.
    ///
    /// Safe to call more than once for the same handle: cleanup may run
    /// from both the normal close path and a drop guard.
    pub async fn deregister(&self, handle: ConnectionId) -> Option<Identity> {
        let removed = self.members.lock().await.remove(&handle);
        removed.map(|entry| entry.identity)
    }

    /// Looks up the identity registered under `handle`.
    pub async fn identity_of(&self, handle: ConnectionId) -> Option<Identity> {
        self.members
            .lock()
            .await
            .get(&handle)
            .map(|entry| entry.identity.clone())
    }

    /// Returns `true` if some member currently holds `name`.
    pub async fn contains_identity(&self, name: &str) -> bool {
        self.members
            .lock()
            .await
            .values()
            .any(|entry| entry.identity.as_str() == name)
    }

    /// Returns the number of live members.
    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    /// Returns `true` if there are no members.
    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }
}

impl<P: Clone> Registry<P> {
    /// Returns a point-in-time copy of all members, in arrival order.
    ///
    /// The copy is taken under the lock; iterate it (and do any I/O)
    /// after this returns.
    pub async fn snapshot(&self) -> Vec<Member<P>> {
        self.members
            .lock()
            .await
            .iter()
            .map(|(handle, entry)| Member {
                handle: *handle,
                identity: entry.identity.clone(),
                peer: entry.peer.clone(),
            })
            .collect()
    }
}

/// Picks the first free name among `proposed`, `proposed_1`,
/// `proposed_2`, …, re-scanning every member for each candidate.
///
/// Terminates because the membership is finite: at most `len` candidates
/// can be taken.
fn resolve_collision<P>(
    members: &BTreeMap<ConnectionId, Entry<P>>,
    proposed: &Identity,
) -> Identity {
    let taken =
        |candidate: &Identity| members.values().any(|e| &e.identity == candidate);

    let mut candidate = proposed.clone();
    let mut suffix = 1;
    while taken(&candidate) {
        candidate = proposed.with_suffix(suffix);
        suffix += 1;
    }
    candidate
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `Registry`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.
    //!
    //! The registry never calls into its peers, so a bare marker type
    //! stands in for a peer handle.

    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, Clone)]
    struct FakePeer;

    fn registry(max_clients: usize) -> Registry<FakePeer> {
        Registry::new(&SessionConfig { max_clients })
    }

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn name(raw: &str) -> Identity {
        Identity::parse(raw).expect("valid name")
    }

    async fn join(
        reg: &Registry<FakePeer>,
        id: u64,
        raw: &str,
    ) -> Result<Registration, SessionError> {
        reg.register(cid(id), name(raw), FakePeer).await
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[tokio::test]
    async fn test_register_free_name_keeps_proposal() {
        let reg = registry(10);

        let r = join(&reg, 1, "alice").await.expect("should register");

        assert_eq!(r.handle, cid(1));
        assert_eq!(r.identity, name("alice"));
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_name_gets_suffix() {
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();

        let r = join(&reg, 2, "alice").await.expect("should register");

        assert_eq!(r.identity, name("alice_1"));
        assert!(reg.contains_identity("alice").await);
        assert!(reg.contains_identity("alice_1").await);
    }

    #[tokio::test]
    async fn test_register_suffix_skips_names_already_taken() {
        // Someone literally called "alice_1" is already here, so the
        // second "alice" must go to "alice_2".
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();
        join(&reg, 2, "alice_1").await.unwrap();

        let r = join(&reg, 3, "alice").await.expect("should register");

        assert_eq!(r.identity, name("alice_2"));
    }

    #[tokio::test]
    async fn test_register_reuses_name_after_holder_leaves() {
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();
        reg.deregister(cid(1)).await;

        let r = join(&reg, 2, "alice").await.unwrap();

        assert_eq!(r.identity, name("alice"));
    }

    #[tokio::test]
    async fn test_register_at_capacity_returns_error_and_leaves_size() {
        let reg = registry(2);
        join(&reg, 1, "alice").await.unwrap();
        join(&reg, 2, "bob").await.unwrap();

        let result = join(&reg, 3, "carol").await;

        assert!(
            matches!(result, Err(SessionError::CapacityExceeded { max: 2 })),
            "should reject when full"
        );
        assert_eq!(reg.len().await, 2);
        assert!(!reg.contains_identity("carol").await);
    }

    #[tokio::test]
    async fn test_register_after_leave_frees_a_slot() {
        let reg = registry(1);
        join(&reg, 1, "alice").await.unwrap();
        assert!(join(&reg, 2, "bob").await.is_err());

        reg.deregister(cid(1)).await;

        assert!(join(&reg, 2, "bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_same_handle_twice_returns_error() {
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();

        let result = join(&reg, 1, "bob").await;

        assert!(matches!(result, Err(SessionError::AlreadyRegistered(h)) if h == cid(1)));
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_register_concurrent_same_name_all_unique() {
        let reg = Arc::new(registry(64));

        let mut tasks = Vec::new();
        for id in 0..32 {
            let reg = Arc::clone(&reg);
            tasks.push(tokio::spawn(async move {
                reg.register(cid(id), name("echo"), FakePeer)
                    .await
                    .expect("capacity is large enough")
                    .identity
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            let identity = task.await.expect("task should complete");
            assert!(seen.insert(identity.clone()), "duplicate {identity}");
        }
        assert_eq!(seen.len(), 32);
        assert!(seen.contains(&name("echo")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_register_concurrent_never_exceeds_capacity() {
        let reg = Arc::new(registry(5));

        let mut tasks = Vec::new();
        for id in 0..20 {
            let reg = Arc::clone(&reg);
            tasks.push(tokio::spawn(async move {
                reg.register(cid(id), name("user"), FakePeer)
                    .await
                    .is_ok()
            }));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.expect("task should complete") {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
        assert_eq!(reg.len().await, 5);
    }

    // =====================================================================
    // deregister()
    // =====================================================================

    #[tokio::test]
    async fn test_deregister_returns_identity() {
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();

        assert_eq!(reg.deregister(cid(1)).await, Some(name("alice")));
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn test_deregister_twice_is_idempotent() {
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();
        join(&reg, 2, "bob").await.unwrap();

        reg.deregister(cid(1)).await;
        let after_once: Vec<_> = reg
            .snapshot()
            .await
            .into_iter()
            .map(|m| m.identity)
            .collect();

        assert_eq!(reg.deregister(cid(1)).await, None);
        let after_twice: Vec<_> = reg
            .snapshot()
            .await
            .into_iter()
            .map(|m| m.identity)
            .collect();

        assert_eq!(after_once, after_twice);
        assert_eq!(after_twice, vec![name("bob")]);
    }

    #[tokio::test]
    async fn test_deregister_unknown_handle_is_noop() {
        let reg = registry(10);
        assert_eq!(reg.deregister(cid(99)).await, None);
        assert!(reg.is_empty().await);
    }

    // =====================================================================
    // snapshot() and lookups
    // =====================================================================

    #[tokio::test]
    async fn test_snapshot_is_in_arrival_order() {
        let reg = registry(10);
        join(&reg, 3, "carol").await.unwrap();
        join(&reg, 1, "alice").await.unwrap();
        join(&reg, 2, "bob").await.unwrap();

        let handles: Vec<_> =
            reg.snapshot().await.into_iter().map(|m| m.handle).collect();

        assert_eq!(handles, vec![cid(1), cid(2), cid(3)]);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_later_changes() {
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();

        let snap = reg.snapshot().await;
        reg.deregister(cid(1)).await;
        join(&reg, 2, "bob").await.unwrap();

        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].identity, name("alice"));
    }

    #[tokio::test]
    async fn test_identity_of_known_and_unknown() {
        let reg = registry(10);
        join(&reg, 1, "alice").await.unwrap();
        join(&reg, 2, "alice").await.unwrap();

        assert_eq!(reg.identity_of(cid(2)).await, Some(name("alice_1")));
        assert_eq!(reg.identity_of(cid(3)).await, None);
    }
}
