//! Explicit mapping from event-type discriminators to deserializers.
//!
//! The outbox stores `event_type` as an opaque string. Rather than resolving
//! it to a runtime type reflectively, the dispatcher consults this registry:
//! a message whose type is absent, or whose content fails its registered
//! deserializer, is a poison message and never reaches the bus.

use std::collections::HashMap;

use thiserror::Error;

use crate::event::IntegrationEvent;

type Decoder = Box<dyn Fn(&str) -> Result<serde_json::Value, serde_json::Error> + Send + Sync>;

/// Why a stored message could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No deserializer registered for this event type.
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// The content did not match the registered schema.
    #[error("undeserializable payload for {event_type}: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Registry of known integration event types.
pub struct EventRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register an event type. The stored decoder validates content against
    /// the concrete schema before it is allowed onto the bus.
    pub fn register<E: IntegrationEvent>(mut self) -> Self {
        self.decoders.insert(
            E::EVENT_TYPE,
            Box::new(|content| {
                let event: E = serde_json::from_str(content)?;
                serde_json::to_value(event)
            }),
        );
        self
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Validate and decode stored content into a publishable JSON payload.
    pub fn decode(&self, event_type: &str, content: &str) -> Result<serde_json::Value, DecodeError> {
        let decoder = self
            .decoders
            .get(event_type)
            .ok_or_else(|| DecodeError::UnknownType(event_type.to_string()))?;

        decoder(content).map_err(|source| DecodeError::Payload {
            event_type: event_type.to_string(),
            source,
        })
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("event_types", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}
