use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::IntegrationEvent;
use crate::registry::DecodeError;

/// Wire envelope for an integration event.
///
/// This is the unit that travels over the bus: common metadata plus the
/// event-specific payload as JSON. The `event_type` field selects the channel
/// and tells consumers how to interpret `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: Uuid,
    event_type: String,
    occurred_on: DateTime<Utc>,
    payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wrap a typed event in a fresh envelope (new id, current time).
    pub fn for_event<E: IntegrationEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: Uuid::now_v7(),
            event_type: E::EVENT_TYPE.to_string(),
            occurred_on: Utc::now(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// Rebuild an envelope from stored parts (outbox dispatch path).
    pub fn from_parts(
        event_id: Uuid,
        event_type: impl Into<String>,
        occurred_on: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            occurred_on,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Decode the payload as a concrete event type.
    ///
    /// Fails if the envelope carries a different event type or the payload
    /// does not match the expected schema.
    pub fn decode<E: IntegrationEvent>(&self) -> Result<E, DecodeError> {
        if self.event_type != E::EVENT_TYPE {
            return Err(DecodeError::UnknownType(self.event_type.clone()));
        }
        serde_json::from_value(self.payload.clone()).map_err(|source| DecodeError::Payload {
            event_type: self.event_type.clone(),
            source,
        })
    }
}
