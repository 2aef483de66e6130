//! Integration event bus abstraction.
//!
//! The bus is the transport layer between modules. Delivery is
//! **at-least-once**: a consumer may see the same event more than once
//! (dispatcher crash between publish and mark-processed), so consumers must
//! be idempotent. A consumer failure propagates out of `publish` — it is the
//! redelivery signal the outbox dispatcher relies on to leave the message
//! pending and retry it next cycle.

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::EventEnvelope;
use crate::registry::DecodeError;

/// Why a consumer rejected an event.
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// The payload did not decode into the consumer's expected event type.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The local command handler failed.
    #[error("handler failed: {0}")]
    Handler(String),
}

/// Why a publish failed.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A subscribed consumer failed; the message should be redelivered.
    #[error("consumer for {event_type} failed: {source}")]
    Consumer {
        event_type: String,
        #[source]
        source: ConsumeError,
    },

    /// The transport itself failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Publish side of the bus.
#[async_trait]
pub trait IntegrationEventBus: Send + Sync {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError>;
}

#[async_trait]
impl<B> IntegrationEventBus for std::sync::Arc<B>
where
    B: IntegrationEventBus + ?Sized,
{
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
        (**self).publish(envelope).await
    }
}

/// A typed consumer, subscribed to one logical channel (one event type).
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// The channel this consumer subscribes to.
    fn event_type(&self) -> &'static str;

    /// Handle one delivery. Must be idempotent; errors propagate to the
    /// publisher as a redelivery signal.
    async fn consume(&self, envelope: &EventEnvelope) -> Result<(), ConsumeError>;
}
