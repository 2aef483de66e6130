//! `modushop-outbox` — transactional outbox store and dispatcher.
//!
//! The outbox pattern: a module records the intent to publish an integration
//! event in the same database transaction as the business mutation it
//! describes, then a background dispatcher publishes it asynchronously. This
//! removes the dual-write problem (commit succeeds, publish fails) at the
//! cost of at-least-once delivery.

pub mod dispatcher;
pub mod message;
pub mod postgres;
pub mod store;

pub use dispatcher::{CycleStats, DispatcherConfig, DispatcherHandle, OutboxDispatcher};
pub use message::{OutboxMessage, OutboxMessageId};
pub use postgres::PostgresOutboxStore;
pub use store::{InMemoryOutboxStore, OutboxStore, OutboxStoreError};
