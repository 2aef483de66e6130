//! Outbox dispatcher: the background loop that turns committed intent into
//! published events.
//!
//! Polling, at-least-once. A publish that succeeds but whose mark-processed
//! update is lost (crash between the two) is published again next cycle;
//! consumers are required to be idempotent. Per-message failures are isolated
//! and bounded (dead-letter after a threshold); cycle-level failures are
//! logged and the loop retries after the poll interval.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use modushop_events::{EventEnvelope, EventRegistry, IntegrationEventBus};

use crate::message::OutboxMessageId;
use crate::store::{OutboxStore, OutboxStoreError};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long to sleep between cycles.
    pub poll_interval: Duration,
    /// Maximum messages fetched per cycle.
    pub batch_limit: usize,
    /// Failed decode attempts before a poison message is dead-lettered.
    /// Publish failures are transient (a consumer or the bus is down) and
    /// retry indefinitely; only an undecodable payload can dead-letter.
    pub dead_letter_after: u32,
    /// When set, processed rows older than this are purged each cycle.
    pub retention: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            batch_limit: 100,
            dead_letter_after: 5,
            retention: None,
        }
    }
}

impl DispatcherConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_dead_letter_after(mut self, attempts: u32) -> Self {
        self.dead_letter_after = attempts;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub published: usize,
    pub failed: usize,
    pub purged: u64,
}

/// Handle to control a running dispatcher.
#[derive(Debug)]
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Request graceful shutdown and wait for the loop to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Background outbox dispatcher.
pub struct OutboxDispatcher<S, B> {
    store: S,
    bus: B,
    registry: EventRegistry,
    config: DispatcherConfig,
}

impl<S, B> OutboxDispatcher<S, B>
where
    S: OutboxStore + 'static,
    B: IntegrationEventBus + 'static,
{
    pub fn new(store: S, bus: B, registry: EventRegistry, config: DispatcherConfig) -> Self {
        Self {
            store,
            bus,
            registry,
            config,
        }
    }

    /// Spawn the dispatcher as a background task.
    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        DispatcherHandle {
            shutdown: shutdown_tx,
            join,
        }
    }

    /// Run the polling loop until the shutdown signal flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "outbox dispatcher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle(&shutdown).await {
                Ok(stats) if stats.fetched > 0 => {
                    debug!(
                        fetched = stats.fetched,
                        published = stats.published,
                        failed = stats.failed,
                        purged = stats.purged,
                        "outbox cycle complete"
                    );
                }
                Ok(_) => {}
                // Store unavailable or similar: retry after the interval.
                Err(err) => error!(error = %err, "outbox cycle failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("outbox dispatcher stopped");
    }

    /// One dispatch cycle. Exposed so tests (and operational tooling) can
    /// drive cycles without the sleep loop.
    pub async fn run_cycle(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleStats, OutboxStoreError> {
        let pending = self.store.fetch_pending(self.config.batch_limit).await?;

        let mut stats = CycleStats {
            fetched: pending.len(),
            ..CycleStats::default()
        };
        let mut published_ids: Vec<OutboxMessageId> = Vec::new();

        for message in pending {
            // Cooperative cancellation between messages, never mid-publish.
            if *shutdown.borrow() {
                break;
            }

            let payload = match self.registry.decode(&message.event_type, &message.content) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        message_id = %message.id,
                        event_type = message.event_type,
                        error = %err,
                        "poison outbox message, skipping"
                    );
                    self.note_failure(
                        message.id,
                        &err.to_string(),
                        Some(self.config.dead_letter_after),
                    )
                    .await;
                    stats.failed += 1;
                    continue;
                }
            };

            let envelope = EventEnvelope::from_parts(
                *message.id.as_uuid(),
                message.event_type.clone(),
                message.occurred_on,
                payload,
            );

            match self.bus.publish(&envelope).await {
                Ok(()) => {
                    info!(message_id = %message.id, event_type = message.event_type,
                        "outbox message published");
                    published_ids.push(message.id);
                    stats.published += 1;
                }
                Err(err) => {
                    warn!(
                        message_id = %message.id,
                        event_type = message.event_type,
                        error = %err,
                        "publish failed, message stays pending"
                    );
                    self.note_failure(message.id, &err.to_string(), None).await;
                    stats.failed += 1;
                }
            }
        }

        // One batched save per cycle.
        if !published_ids.is_empty() {
            self.store
                .mark_processed(&published_ids, Utc::now())
                .await?;
        }

        if let Some(retention) = self.config.retention {
            let cutoff = Utc::now()
                - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
            stats.purged = self.store.purge_processed(cutoff).await?;
        }

        Ok(stats)
    }

    /// Best-effort failure bookkeeping; a store error here must not take down
    /// the rest of the batch.
    async fn note_failure(&self, id: OutboxMessageId, error: &str, dead_letter_after: Option<u32>) {
        if let Err(store_err) = self
            .store
            .record_failure(id, error, dead_letter_after)
            .await
        {
            warn!(message_id = %id, error = %store_err, "failed to record outbox failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::OutboxMessage;
    use crate::store::InMemoryOutboxStore;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use modushop_events::{IntegrationEvent, PublishError};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    impl IntegrationEvent for Ping {
        const EVENT_TYPE: &'static str = "test.ping";
    }

    /// Bus that records what it saw and can be told to fail.
    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<EventEnvelope>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl IntegrationEventBus for RecordingBus {
        async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PublishError::Transport("bus down".into()));
            }
            self.published.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    /// Store wrapper that loses the first mark-processed save, simulating a
    /// crash between publish and mark.
    struct ForgetfulStore {
        inner: InMemoryOutboxStore,
        drop_next_mark: AtomicBool,
    }

    #[async_trait]
    impl OutboxStore for ForgetfulStore {
        async fn append(&self, message: OutboxMessage) -> Result<(), OutboxStoreError> {
            self.inner.append(message).await
        }

        async fn fetch_pending(
            &self,
            limit: usize,
        ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
            self.inner.fetch_pending(limit).await
        }

        async fn mark_processed(
            &self,
            ids: &[OutboxMessageId],
            processed_on: DateTime<Utc>,
        ) -> Result<(), OutboxStoreError> {
            if self.drop_next_mark.swap(false, Ordering::SeqCst) {
                return Err(OutboxStoreError::Storage("simulated crash".into()));
            }
            self.inner.mark_processed(ids, processed_on).await
        }

        async fn record_failure(
            &self,
            id: OutboxMessageId,
            error: &str,
            dead_letter_after: Option<u32>,
        ) -> Result<(), OutboxStoreError> {
            self.inner.record_failure(id, error, dead_letter_after).await
        }

        async fn list_dead_lettered(
            &self,
            limit: usize,
        ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
            self.inner.list_dead_lettered(limit).await
        }

        async fn purge_processed(
            &self,
            older_than: DateTime<Utc>,
        ) -> Result<u64, OutboxStoreError> {
            self.inner.purge_processed(older_than).await
        }
    }

    fn registry() -> EventRegistry {
        EventRegistry::new().register::<Ping>()
    }

    fn idle_shutdown() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the duration of the test.
        Box::leak(Box::new(tx));
        rx
    }

    fn dispatcher(
        store: InMemoryOutboxStore,
        bus: std::sync::Arc<RecordingBus>,
    ) -> OutboxDispatcher<InMemoryOutboxStore, std::sync::Arc<RecordingBus>> {
        OutboxDispatcher::new(store, bus, registry(), DispatcherConfig::default())
    }

    #[tokio::test]
    async fn pending_messages_are_published_and_marked() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());

        let msg = OutboxMessage::for_event(&Ping { n: 1 }).unwrap();
        store.append(msg.clone()).await.unwrap();

        let d = dispatcher(store.clone(), bus.clone());
        let stats = d.run_cycle(&idle_shutdown()).await.unwrap();

        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.published, 1);
        assert!(store.fetch_pending(10).await.unwrap().is_empty());

        let published = bus.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_id(), *msg.id.as_uuid());
        assert_eq!(published[0].event_type(), Ping::EVENT_TYPE);
    }

    #[tokio::test]
    async fn idempotent_rerun_publishes_nothing_new() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());

        store
            .append(OutboxMessage::for_event(&Ping { n: 1 }).unwrap())
            .await
            .unwrap();

        let d = dispatcher(store.clone(), bus.clone());
        let shutdown = idle_shutdown();
        d.run_cycle(&shutdown).await.unwrap();
        let stats = d.run_cycle(&shutdown).await.unwrap();

        assert_eq!(stats.fetched, 0);
        assert_eq!(stats.published, 0);
        assert_eq!(bus.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn poison_message_does_not_block_the_batch() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());

        let mut poison = OutboxMessage::new("no.such.type", "{}");
        poison.occurred_on = Utc::now() - chrono::Duration::seconds(5);
        store.append(poison.clone()).await.unwrap();
        let healthy = OutboxMessage::for_event(&Ping { n: 2 }).unwrap();
        store.append(healthy.clone()).await.unwrap();

        let d = dispatcher(store.clone(), bus.clone());
        let stats = d.run_cycle(&idle_shutdown()).await.unwrap();

        assert_eq!(stats.published, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(bus.published.lock().unwrap().len(), 1);

        // The poison row stays pending (below the dead-letter threshold).
        let pending = store.fetch_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, poison.id);
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn poison_message_dead_letters_after_threshold() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());

        let poison = OutboxMessage::new(Ping::EVENT_TYPE, "not json");
        store.append(poison.clone()).await.unwrap();

        let config = DispatcherConfig::default().with_dead_letter_after(2);
        let d = OutboxDispatcher::new(store.clone(), bus, registry(), config);

        let shutdown = idle_shutdown();
        d.run_cycle(&shutdown).await.unwrap();
        d.run_cycle(&shutdown).await.unwrap();
        // Third cycle sees nothing: the row is dead-lettered, not pending.
        let stats = d.run_cycle(&shutdown).await.unwrap();
        assert_eq!(stats.fetched, 0);

        let dead = store.list_dead_lettered(10).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
    }

    #[tokio::test]
    async fn bus_failure_leaves_message_pending() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());
        bus.fail.store(true, Ordering::SeqCst);

        let msg = OutboxMessage::for_event(&Ping { n: 3 }).unwrap();
        store.append(msg.clone()).await.unwrap();

        let d = dispatcher(store.clone(), bus.clone());
        let shutdown = idle_shutdown();
        let stats = d.run_cycle(&shutdown).await.unwrap();
        assert_eq!(stats.published, 0);
        assert_eq!(stats.failed, 1);

        // Bus recovers; the same message goes out next cycle.
        bus.fail.store(false, Ordering::SeqCst);
        let stats = d.run_cycle(&shutdown).await.unwrap();
        assert_eq!(stats.published, 1);
    }

    #[tokio::test]
    async fn prolonged_bus_outage_never_dead_letters_a_healthy_message() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());
        bus.fail.store(true, Ordering::SeqCst);

        let msg = OutboxMessage::for_event(&Ping { n: 6 }).unwrap();
        store.append(msg.clone()).await.unwrap();

        let config = DispatcherConfig::default().with_dead_letter_after(2);
        let d = OutboxDispatcher::new(store.clone(), bus.clone(), registry(), config);

        // An outage lasting well past the poison threshold.
        let shutdown = idle_shutdown();
        for _ in 0..6 {
            d.run_cycle(&shutdown).await.unwrap();
        }

        assert!(store.list_dead_lettered(10).await.unwrap().is_empty());
        let pending = store.fetch_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 6);

        // Recovery: the message still goes out.
        bus.fail.store(false, Ordering::SeqCst);
        let stats = d.run_cycle(&shutdown).await.unwrap();
        assert_eq!(stats.published, 1);
    }

    #[tokio::test]
    async fn lost_mark_causes_duplicate_publish_next_cycle() {
        let inner = InMemoryOutboxStore::new();
        let store = std::sync::Arc::new(ForgetfulStore {
            inner: inner.clone(),
            drop_next_mark: AtomicBool::new(true),
        });
        let bus = std::sync::Arc::new(RecordingBus::default());

        inner
            .append(OutboxMessage::for_event(&Ping { n: 4 }).unwrap())
            .await
            .unwrap();

        let d = OutboxDispatcher::new(
            store,
            bus.clone(),
            registry(),
            DispatcherConfig::default(),
        );

        let shutdown = idle_shutdown();
        // First cycle publishes but the mark is lost.
        assert!(d.run_cycle(&shutdown).await.is_err());
        // Second cycle redelivers: at-least-once, not at-most-once.
        let stats = d.run_cycle(&shutdown).await.unwrap();
        assert_eq!(stats.published, 1);
        assert_eq!(bus.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retention_purges_processed_rows() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());

        let mut stale = OutboxMessage::for_event(&Ping { n: 5 }).unwrap();
        stale.mark_processed(Utc::now() - chrono::Duration::days(30));
        store.append(stale).await.unwrap();

        let config = DispatcherConfig::default()
            .with_retention(Duration::from_secs(7 * 24 * 3600));
        let d = OutboxDispatcher::new(store, bus, registry(), config);

        let stats = d.run_cycle(&idle_shutdown()).await.unwrap();
        assert_eq!(stats.purged, 1);
    }

    #[tokio::test]
    async fn shutdown_stops_loop_during_sleep() {
        let store = InMemoryOutboxStore::new();
        let bus = std::sync::Arc::new(RecordingBus::default());
        let config = DispatcherConfig::default().with_poll_interval(Duration::from_secs(3600));

        let handle = OutboxDispatcher::new(store, bus, registry(), config).spawn();

        // Returns promptly despite the hour-long poll interval.
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("dispatcher did not stop on shutdown signal");
    }
}
