//! In-process event bus for the modular monolith deployment.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bus::{EventConsumer, IntegrationEventBus, PublishError};
use crate::envelope::EventEnvelope;

/// Routes each envelope to the consumers subscribed to its event type.
///
/// Consumers are registered during process wiring, before the bus is shared;
/// there is no runtime subscription churn. Delivery is sequential per
/// publish, and the first consumer error aborts the publish so the caller
/// (the outbox dispatcher) retries the whole message later. Consumers must
/// therefore tolerate seeing an event again after a sibling consumer failed.
pub struct InProcessEventBus {
    consumers: HashMap<&'static str, Vec<Arc<dyn EventConsumer>>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self {
            consumers: HashMap::new(),
        }
    }

    /// Subscribe a consumer to its declared event type.
    pub fn subscribe(mut self, consumer: Arc<dyn EventConsumer>) -> Self {
        self.consumers
            .entry(consumer.event_type())
            .or_default()
            .push(consumer);
        self
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationEventBus for InProcessEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
        let Some(consumers) = self.consumers.get(envelope.event_type()) else {
            // No subscriber is not an error: the channel simply has no
            // consumer in this deployment.
            debug!(
                event_type = envelope.event_type(),
                event_id = %envelope.event_id(),
                "no consumers subscribed, dropping event"
            );
            return Ok(());
        };

        for consumer in consumers {
            consumer
                .consume(envelope)
                .await
                .map_err(|source| PublishError::Consumer {
                    event_type: envelope.event_type().to_string(),
                    source,
                })?;
        }

        info!(
            event_type = envelope.event_type(),
            event_id = %envelope.event_id(),
            consumers = consumers.len(),
            "integration event delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ConsumeError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Counting {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EventConsumer for Counting {
        fn event_type(&self) -> &'static str {
            "test.event"
        }

        async fn consume(&self, _envelope: &EventEnvelope) -> Result<(), ConsumeError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventConsumer for Failing {
        fn event_type(&self) -> &'static str {
            "test.event"
        }

        async fn consume(&self, _envelope: &EventEnvelope) -> Result<(), ConsumeError> {
            Err(ConsumeError::Handler("boom".into()))
        }
    }

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::from_parts(Uuid::now_v7(), event_type, Utc::now(), serde_json::json!({}))
    }

    #[tokio::test]
    async fn routes_by_event_type() {
        let counting = Arc::new(Counting {
            seen: AtomicUsize::new(0),
        });
        let bus = InProcessEventBus::new().subscribe(counting.clone());

        bus.publish(&envelope("test.event")).await.unwrap();
        bus.publish(&envelope("unrelated.event")).await.unwrap();

        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn consumer_failure_propagates_as_redelivery_signal() {
        let bus = InProcessEventBus::new().subscribe(Arc::new(Failing));

        let err = bus.publish(&envelope("test.event")).await.unwrap_err();
        assert!(matches!(err, PublishError::Consumer { .. }));
    }

    #[tokio::test]
    async fn unsubscribed_channel_is_not_an_error() {
        let bus = InProcessEventBus::new();
        bus.publish(&envelope("nobody.listens")).await.unwrap();
    }
}
