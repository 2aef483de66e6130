//! Outbox storage abstraction and in-memory implementation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::message::{OutboxMessage, OutboxMessageId};

/// Outbox store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OutboxStoreError {
    #[error("outbox message not found: {0}")]
    NotFound(OutboxMessageId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Storage for outbox rows.
///
/// Appending happens inside the business transaction and is therefore the
/// concern of the module store owning that transaction (see
/// `postgres::append_in_tx`); the `append` method here exists for stores that
/// share a handle with the module store (in-memory wiring and tests). The
/// remaining operations are the dispatcher's read/mutate surface.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Append a new pending message.
    async fn append(&self, message: OutboxMessage) -> Result<(), OutboxStoreError>;

    /// Pending messages (not processed, not dead-lettered), oldest first.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxStoreError>;

    /// Batch-mark messages as delivered.
    async fn mark_processed(
        &self,
        ids: &[OutboxMessageId],
        processed_on: DateTime<Utc>,
    ) -> Result<(), OutboxStoreError>;

    /// Record a failed dispatch attempt; dead-letter at the threshold.
    /// `None` counts the attempt without ever dead-lettering.
    async fn record_failure(
        &self,
        id: OutboxMessageId,
        error: &str,
        dead_letter_after: Option<u32>,
    ) -> Result<(), OutboxStoreError>;

    /// Dead-lettered messages for operator inspection, oldest first.
    async fn list_dead_lettered(
        &self,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError>;

    /// Delete processed messages older than the cutoff. Returns the number of
    /// rows removed. Pending and dead-lettered rows are never purged.
    async fn purge_processed(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, OutboxStoreError>;
}

/// In-memory outbox store for tests/dev.
///
/// Module stores (basket, catalog) hold a clone of the same `Arc`'d rows so
/// their "transactions" and the dispatcher observe one shared table, mirroring
/// the co-located outbox table in Postgres.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOutboxStore {
    rows: Arc<Mutex<Vec<OutboxMessage>>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct handle to the backing rows, for module stores that append
    /// within their own critical section.
    pub fn rows(&self) -> Arc<Mutex<Vec<OutboxMessage>>> {
        self.rows.clone()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<OutboxMessage>>, OutboxStoreError> {
        self.rows
            .lock()
            .map_err(|_| OutboxStoreError::Storage("outbox lock poisoned".into()))
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn append(&self, message: OutboxMessage) -> Result<(), OutboxStoreError> {
        self.lock()?.push(message);
        Ok(())
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let rows = self.lock()?;
        let mut pending: Vec<_> = rows.iter().filter(|m| m.is_pending()).cloned().collect();
        pending.sort_by_key(|m| m.occurred_on);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_processed(
        &self,
        ids: &[OutboxMessageId],
        processed_on: DateTime<Utc>,
    ) -> Result<(), OutboxStoreError> {
        let mut rows = self.lock()?;
        for row in rows.iter_mut() {
            if ids.contains(&row.id) {
                row.mark_processed(processed_on);
            }
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: OutboxMessageId,
        error: &str,
        dead_letter_after: Option<u32>,
    ) -> Result<(), OutboxStoreError> {
        let mut rows = self.lock()?;
        let row = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(OutboxStoreError::NotFound(id))?;
        row.record_failure(error, dead_letter_after);
        Ok(())
    }

    async fn list_dead_lettered(
        &self,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let rows = self.lock()?;
        let mut dead: Vec<_> = rows
            .iter()
            .filter(|m| m.is_dead_lettered())
            .cloned()
            .collect();
        dead.sort_by_key(|m| m.occurred_on);
        dead.truncate(limit);
        Ok(dead)
    }

    async fn purge_processed(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, OutboxStoreError> {
        let mut rows = self.lock()?;
        let before = rows.len();
        rows.retain(|m| match m.processed_on {
            Some(at) => at >= older_than,
            None => true,
        });
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl<S> OutboxStore for Arc<S>
where
    S: OutboxStore + ?Sized,
{
    async fn append(&self, message: OutboxMessage) -> Result<(), OutboxStoreError> {
        (**self).append(message).await
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        (**self).fetch_pending(limit).await
    }

    async fn mark_processed(
        &self,
        ids: &[OutboxMessageId],
        processed_on: DateTime<Utc>,
    ) -> Result<(), OutboxStoreError> {
        (**self).mark_processed(ids, processed_on).await
    }

    async fn record_failure(
        &self,
        id: OutboxMessageId,
        error: &str,
        dead_letter_after: Option<u32>,
    ) -> Result<(), OutboxStoreError> {
        (**self).record_failure(id, error, dead_letter_after).await
    }

    async fn list_dead_lettered(
        &self,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        (**self).list_dead_lettered(limit).await
    }

    async fn purge_processed(&self, older_than: DateTime<Utc>) -> Result<u64, OutboxStoreError> {
        (**self).purge_processed(older_than).await
    }
}
