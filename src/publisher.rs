//! Best-effort publication of domain events to NATS.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

/// Publishes committed domain events. Without a NATS client events are only logged.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Failures are logged and dropped: the events describe state that is
    /// already committed.
    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.publish(&event).await;
        }
    }

    async fn publish(&self, event: &DomainEvent) {
        let Some(nats) = &self.nats else {
            debug!(subject = event.subject(), "no NATS client, event not published");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => { warn!(error = %e, "failed to encode event"); return; }
        };
        if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
            warn!(subject = event.subject(), error = %e, "failed to publish event");
        }
    }
}
