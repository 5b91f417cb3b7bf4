use tokio::sync::mpsc;
use tracing::{debug, info};

use guidepost_types::events::GatewayEvent;
use guidepost_types::models::{Participant, PresenceSnapshot};

use crate::registry::{ConnectionHandle, ConnectionId, Registry};

/// Events queued for one connection: targeted pushes and presence snapshots.
pub type EventStream = mpsc::UnboundedReceiver<GatewayEvent>;

/// Drives the Disconnected -> Connected -> Disconnected transitions and keeps
/// every connection informed of registry membership.
#[derive(Clone)]
pub struct LifecycleManager {
    registry: Registry,
}

impl LifecycleManager {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register `participant` and broadcast the new snapshot. A previous
    /// connection for the same participant is displaced and its stream ends.
    pub async fn connect(&self, participant: Participant) -> (Session, EventStream) {
        let (handle, events) = ConnectionHandle::new(participant);
        let connection_id = handle.id();

        if let Some(stale) = self.registry.register(handle).await {
            info!("{} reconnected, dropping connection {}", participant, stale.id());
        }
        self.registry.broadcast_snapshot().await;

        let session = Session {
            participant,
            connection_id,
            registry: self.registry.clone(),
        };
        (session, events)
    }
}

/// A connected participant. Consumed by [`Session::disconnect`].
pub struct Session {
    participant: Participant,
    connection_id: ConnectionId,
    registry: Registry,
}

impl Session {
    pub fn participant(&self) -> Participant {
        self.participant
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// The registry handle for this participant, if it is still ours.
    async fn current_handle(&self) -> Option<ConnectionHandle> {
        self.registry
            .lookup(&self.participant)
            .await
            .filter(|h| h.id() == self.connection_id)
    }

    #[cfg(test)]
    async fn is_current(&self) -> bool {
        self.current_handle().await.is_some()
    }

    /// Push the current snapshot to this connection only.
    pub async fn send_presence(&self) -> Option<PresenceSnapshot> {
        let handle = self.current_handle().await?;
        let snapshot = self.registry.snapshot().await;
        handle
            .push(GatewayEvent::PresenceSnapshot(snapshot.clone()))
            .then_some(snapshot)
    }

    /// Unregister and rebroadcast. A session that was already displaced by a
    /// newer connection leaves the registry untouched.
    pub async fn disconnect(self) {
        if self
            .registry
            .unregister_if_current(&self.participant, self.connection_id)
            .await
        {
            self.registry.broadcast_snapshot().await;
        } else {
            debug!(
                "{} connection {} was already replaced",
                self.participant, self.connection_id
            );
        }
    }
}
