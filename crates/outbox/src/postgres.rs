//! Postgres-backed outbox store.
//!
//! The `outbox_messages` table lives in the same database as the module data
//! it accompanies; `append_in_tx` is the hook module stores use to write the
//! row inside their own business transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::message::{OutboxMessage, OutboxMessageId};
use crate::store::{OutboxStore, OutboxStoreError};

/// Append an outbox row within an already-open transaction.
///
/// This is the transactional half of the outbox pattern: callers commit the
/// business mutation and this insert together, or neither.
pub async fn append_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    message: &OutboxMessage,
) -> Result<(), OutboxStoreError> {
    sqlx::query(
        r#"
        INSERT INTO outbox_messages (
            id,
            event_type,
            content,
            occurred_on,
            processed_on,
            attempts,
            last_error,
            dead_lettered_on
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(message.id.as_uuid())
    .bind(&message.event_type)
    .bind(&message.content)
    .bind(message.occurred_on)
    .bind(message.processed_on)
    .bind(message.attempts as i32)
    .bind(&message.last_error)
    .bind(message.dead_lettered_on)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("append_outbox_message", e))?;

    Ok(())
}

/// Postgres outbox store (the dispatcher's read/mutate surface).
#[derive(Debug, Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn append(&self, message: OutboxMessage) -> Result<(), OutboxStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        append_in_tx(&mut tx, &message).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, content, occurred_on, processed_on,
                   attempts, last_error, dead_lettered_on
            FROM outbox_messages
            WHERE processed_on IS NULL AND dead_lettered_on IS NULL
            ORDER BY occurred_on ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_pending", e))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn mark_processed(
        &self,
        ids: &[OutboxMessageId],
        processed_on: DateTime<Utc>,
    ) -> Result<(), OutboxStoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        sqlx::query(
            r#"
            UPDATE outbox_messages
            SET processed_on = $1
            WHERE id = ANY($2)
            "#,
        )
        .bind(processed_on)
        .bind(&uuids)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_processed", e))?;

        Ok(())
    }

    async fn record_failure(
        &self,
        id: OutboxMessageId,
        error: &str,
        dead_letter_after: Option<u32>,
    ) -> Result<(), OutboxStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET attempts = attempts + 1,
                last_error = $2,
                dead_lettered_on = CASE
                    WHEN $3::int IS NOT NULL AND attempts + 1 >= $3 THEN NOW()
                    ELSE dead_lettered_on
                END
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .bind(dead_letter_after.map(|n| n as i32))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_failure", e))?;

        if result.rows_affected() == 0 {
            return Err(OutboxStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_dead_lettered(
        &self,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, content, occurred_on, processed_on,
                   attempts, last_error, dead_lettered_on
            FROM outbox_messages
            WHERE dead_lettered_on IS NOT NULL
            ORDER BY occurred_on ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_dead_lettered", e))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn purge_processed(&self, older_than: DateTime<Utc>) -> Result<u64, OutboxStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM outbox_messages
            WHERE processed_on IS NOT NULL AND processed_on < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("purge_processed", e))?;

        Ok(result.rows_affected())
    }
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Result<OutboxMessage, OutboxStoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("read_outbox_row", e);
    let attempts: i32 = row.try_get("attempts").map_err(read)?;

    Ok(OutboxMessage {
        id: OutboxMessageId::from_uuid(row.try_get("id").map_err(read)?),
        event_type: row.try_get("event_type").map_err(read)?,
        content: row.try_get("content").map_err(read)?,
        occurred_on: row.try_get("occurred_on").map_err(read)?,
        processed_on: row.try_get("processed_on").map_err(read)?,
        attempts: attempts.max(0) as u32,
        last_error: row.try_get("last_error").map_err(read)?,
        dead_lettered_on: row.try_get("dead_lettered_on").map_err(read)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> OutboxStoreError {
    OutboxStoreError::Storage(format!("{operation}: {err}"))
}
