use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::trace;
use uuid::Uuid;

use guidepost_types::events::GatewayEvent;
use guidepost_types::models::{Participant, PresenceSnapshot};

pub type ConnectionId = Uuid;

/// Outbound side of one live connection.
///
/// Cloning a handle clones the sender; the connection's event stream ends
/// once every clone (including the registry's) is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    participant: Participant,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl ConnectionHandle {
    pub fn new(participant: Participant) -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            participant,
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn participant(&self) -> Participant {
        self.participant
    }

    /// Best-effort push. Returns false if the connection has gone away.
    pub fn push(&self, event: GatewayEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Live mapping from participant to its single active connection.
///
/// Every mutation takes the write lock, and snapshots are built under a
/// lock, so no reader sees a half-applied update.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<Participant, ConnectionHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` for its participant, replacing any previous entry.
    /// Returns the replaced handle, which is stale from here on.
    pub async fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.inner
            .write()
            .await
            .insert(handle.participant, handle)
    }

    /// Remove whatever entry `participant` has. Absent entries are a no-op.
    pub async fn unregister(&self, participant: &Participant) -> bool {
        self.inner.write().await.remove(participant).is_some()
    }

    /// Remove the entry only if it still belongs to `connection_id`.
    pub async fn unregister_if_current(
        &self,
        participant: &Participant,
        connection_id: ConnectionId,
    ) -> bool {
        let mut entries = self.inner.write().await;
        match entries.get(participant) {
            Some(handle) if handle.id == connection_id => {
                entries.remove(participant);
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, participant: &Participant) -> Option<ConnectionHandle> {
        self.inner.read().await.get(participant).cloned()
    }

    pub async fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot::from_participants(self.inner.read().await.keys())
    }

    /// Push the current snapshot to every registered connection.
    ///
    /// Snapshot and fan-out happen under one lock, so each connection sees
    /// snapshots in the order the registry changed.
    pub async fn broadcast_snapshot(&self) -> PresenceSnapshot {
        let entries = self.inner.read().await;
        let snapshot = PresenceSnapshot::from_participants(entries.keys());

        for handle in entries.values() {
            if !handle.push(GatewayEvent::PresenceSnapshot(snapshot.clone())) {
                trace!("presence push to {} dropped, connection closing", handle.participant);
            }
        }

        snapshot
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(event: GatewayEvent) -> PresenceSnapshot {
        match event {
            GatewayEvent::PresenceSnapshot(snapshot) => snapshot,
            other => panic!("expected presence snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reregistration_replaces_previous_handle() {
        let registry = Registry::new();
        let p = Participant::student(7);

        let (h1, mut rx1) = ConnectionHandle::new(p);
        let (h2, mut rx2) = ConnectionHandle::new(p);
        let h1_copy = h1.clone();

        assert!(registry.register(h1).await.is_none());
        let replaced = registry.register(h2.clone()).await.unwrap();
        assert_eq!(replaced.id(), h1_copy.id());

        assert_eq!(registry.lookup(&p).await.unwrap().id(), h2.id());
        assert_eq!(registry.len().await, 1);

        // A push on the stale handle lands on the old channel only.
        h1_copy.push(GatewayEvent::Ready { participant: p });
        assert!(rx2.try_recv().is_err());
        assert!(rx1.try_recv().is_ok());
    }

    #[tokio::test]
    async fn stale_stream_ends_once_registry_drops_it() {
        let registry = Registry::new();
        let p = Participant::counselor(3);

        let (h1, mut rx1) = ConnectionHandle::new(p);
        let (h2, _rx2) = ConnectionHandle::new(p);

        registry.register(h1).await;
        drop(registry.register(h2).await);

        assert!(rx1.recv().await.is_none());
    }

    #[tokio::test]
    async fn unregister_missing_entry_is_noop() {
        let registry = Registry::new();
        assert!(!registry.unregister(&Participant::student(42)).await);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn unregister_if_current_ignores_stale_connection() {
        let registry = Registry::new();
        let p = Participant::student(1);

        let (old, _old_rx) = ConnectionHandle::new(p);
        let (new, _new_rx) = ConnectionHandle::new(p);
        let old_id = old.id();
        let new_id = new.id();

        registry.register(old).await;
        registry.register(new).await;

        assert!(!registry.unregister_if_current(&p, old_id).await);
        assert_eq!(registry.lookup(&p).await.unwrap().id(), new_id);

        assert!(registry.unregister_if_current(&p, new_id).await);
        assert!(registry.lookup(&p).await.is_none());
    }

    #[tokio::test]
    async fn same_id_in_different_roles_are_separate_entries() {
        let registry = Registry::new();
        let (s, _srx) = ConnectionHandle::new(Participant::student(5));
        let (c, _crx) = ConnectionHandle::new(Participant::counselor(5));

        registry.register(s).await;
        registry.register(c).await;
        registry.unregister(&Participant::student(5)).await;

        assert!(registry.lookup(&Participant::counselor(5)).await.is_some());
        let snap = registry.snapshot().await;
        assert_eq!(snap.counselors, vec![5]);
        assert!(snap.students.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_are_all_kept() {
        let registry = Registry::new();
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for id in 1..=64 {
            let participant = if id % 2 == 0 {
                Participant::student(id)
            } else {
                Participant::counselor(id)
            };
            let (handle, rx) = ConnectionHandle::new(participant);
            receivers.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(handle).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.len().await, 64);
        for id in 1..=64 {
            let participant = if id % 2 == 0 {
                Participant::student(id)
            } else {
                Participant::counselor(id)
            };
            assert!(registry.lookup(&participant).await.is_some());
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let registry = Registry::new();
        let (a, mut arx) = ConnectionHandle::new(Participant::student(7));
        let (b, mut brx) = ConnectionHandle::new(Participant::counselor(3));
        registry.register(a).await;
        registry.register(b).await;

        let sent = registry.broadcast_snapshot().await;
        assert_eq!(sent.all, vec![3, 7]);

        assert_eq!(presence(arx.try_recv().unwrap()), sent);
        assert_eq!(presence(brx.try_recv().unwrap()), sent);
    }
}
