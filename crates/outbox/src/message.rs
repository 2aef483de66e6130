//! The persisted outbox row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use modushop_events::IntegrationEvent;

/// Unique outbox message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxMessageId(pub Uuid);

impl OutboxMessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OutboxMessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending or processed integration event, co-located with the business
/// data it accompanies.
///
/// Lifecycle: created inside the business transaction, read and mutated only
/// by the dispatcher. `processed_on` is the primary state flag; `attempts` /
/// `dead_lettered_on` extend the observed design with bounded retries so one
/// poison row cannot be retried forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: OutboxMessageId,
    /// Stable string discriminator, resolved through the `EventRegistry`.
    pub event_type: String,
    /// Serialized JSON payload; opaque at this layer.
    pub content: String,
    pub occurred_on: DateTime<Utc>,
    /// `None` means pending.
    pub processed_on: Option<DateTime<Utc>>,
    /// Failed dispatch attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Set once `attempts` crosses the configured threshold; dead-lettered
    /// rows are excluded from dispatch and surfaced for operator inspection.
    pub dead_lettered_on: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    pub fn new(event_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: OutboxMessageId::new(),
            event_type: event_type.into(),
            content: content.into(),
            occurred_on: Utc::now(),
            processed_on: None,
            attempts: 0,
            last_error: None,
            dead_lettered_on: None,
        }
    }

    /// Build an outbox row for a typed integration event.
    pub fn for_event<E: IntegrationEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self::new(E::EVENT_TYPE, serde_json::to_string(event)?))
    }

    pub fn is_pending(&self) -> bool {
        self.processed_on.is_none() && self.dead_lettered_on.is_none()
    }

    pub fn is_dead_lettered(&self) -> bool {
        self.dead_lettered_on.is_some()
    }

    /// Mark delivered.
    pub fn mark_processed(&mut self, at: DateTime<Utc>) {
        self.processed_on = Some(at);
    }

    /// Record a failed dispatch attempt; dead-letter once the threshold is
    /// reached. `None` means the message can never dead-letter from this
    /// failure, only accumulate attempts.
    pub fn record_failure(&mut self, error: impl Into<String>, dead_letter_after: Option<u32>) {
        self.attempts += 1;
        self.last_error = Some(error.into());
        if let Some(threshold) = dead_letter_after {
            if self.attempts >= threshold {
                self.dead_lettered_on = Some(Utc::now());
            }
        }
    }
}
