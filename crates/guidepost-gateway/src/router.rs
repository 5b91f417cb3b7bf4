use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use guidepost_types::events::GatewayEvent;
use guidepost_types::models::Message;

use crate::registry::Registry;

/// Routes a freshly stored message to whoever should see it live.
///
/// Callers hand over a message only after it has been committed. An
/// implementation must return without waiting on any connection.
pub trait DeliveryRouter: Send + Sync {
    fn dispatch(&self, message: Message);
}

/// What a single delivery attempt managed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub recipient: bool,
    pub sender_echo: bool,
}

/// Fire-and-forget push through the identity registry. No retries: a
/// recipient that misses the push reads it from history later.
///
/// Dispatched messages go through a single queue drained by one worker
/// task, so pushes leave in the order their messages were committed.
pub struct LiveRouter {
    delivery: Delivery,
    queue: mpsc::UnboundedSender<Message>,
}

#[derive(Clone)]
struct Delivery {
    registry: Registry,
    echo_to_sender: bool,
}

impl LiveRouter {
    /// Must be called from within a tokio runtime; spawns the delivery worker.
    pub fn new(registry: Registry, echo_to_sender: bool) -> Self {
        let delivery = Delivery {
            registry,
            echo_to_sender,
        };
        let (queue, mut pending) = mpsc::unbounded_channel::<Message>();

        let worker = delivery.clone();
        tokio::spawn(async move {
            while let Some(message) = pending.recv().await {
                let id = message.id;
                let outcome = worker.deliver(message).await;
                trace!("message {} dispatched: {:?}", id, outcome);
            }
            debug!("delivery queue closed");
        });

        Self { delivery, queue }
    }

    /// Perform the lookups and pushes inline, bypassing the queue.
    pub async fn deliver(&self, message: Message) -> DeliveryOutcome {
        self.delivery.deliver(message).await
    }
}

impl Delivery {
    async fn deliver(&self, message: Message) -> DeliveryOutcome {
        let mut outcome = DeliveryOutcome::default();
        let recipient = message.recipient();
        let sender = message.sender();

        match self.registry.lookup(&recipient).await {
            Some(handle) => {
                outcome.recipient = handle.push(GatewayEvent::MessageCreate(message.clone()));
                if !outcome.recipient {
                    debug!("message {} push to {} failed, left for history", message.id, recipient);
                }
            }
            None => trace!("message {}: {} offline", message.id, recipient),
        }

        if self.echo_to_sender {
            if let Some(handle) = self.registry.lookup(&sender).await {
                outcome.sender_echo = handle.push(GatewayEvent::MessageCreate(message));
            }
        }

        outcome
    }
}

impl DeliveryRouter for LiveRouter {
    fn dispatch(&self, message: Message) {
        if let Err(e) = self.queue.send(message) {
            warn!("delivery worker gone, message {} left for history", e.0.id);
        }
    }
}
