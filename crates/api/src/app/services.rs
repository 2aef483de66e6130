//! Infrastructure wiring: stores, bus, consumers, dispatcher.

use std::sync::Arc;

use sqlx::PgPool;

use modushop_basket::{
    BasketStore, CachedBasketStore, InMemoryBasketCache, InMemoryBasketStore, PostgresBasketStore,
    ProductPriceChangedConsumer,
};
use modushop_catalog::{InMemoryProductStore, PostgresProductStore, ProductStore};
use modushop_events::{
    BasketCheckedOut, EventRegistry, InProcessEventBus, ProductPriceChanged,
};
use modushop_ordering::{BasketCheckedOutConsumer, InMemoryOrderStore, OrderStore, PostgresOrderStore};
use modushop_outbox::{
    DispatcherConfig, DispatcherHandle, InMemoryOutboxStore, OutboxDispatcher, OutboxStore,
    PostgresOutboxStore,
};

/// Every service the HTTP handlers reach for, behind trait objects so the
/// in-memory and Postgres deployments share one router.
#[derive(Clone)]
pub struct AppServices {
    pub basket_store: Arc<dyn BasketStore>,
    pub order_store: Arc<dyn OrderStore>,
    pub product_store: Arc<dyn ProductStore>,
    pub outbox_store: Arc<dyn OutboxStore>,
}

/// All integration event types this process can replay from the outbox.
/// A type missing here is a poison message; add new events to this list.
pub fn event_registry() -> EventRegistry {
    EventRegistry::new()
        .register::<BasketCheckedOut>()
        .register::<ProductPriceChanged>()
}

fn build_bus(
    basket_store: Arc<dyn BasketStore>,
    order_store: Arc<dyn OrderStore>,
) -> Arc<InProcessEventBus> {
    Arc::new(
        InProcessEventBus::new()
            .subscribe(Arc::new(BasketCheckedOutConsumer::new(order_store)))
            .subscribe(Arc::new(ProductPriceChangedConsumer::new(basket_store))),
    )
}

/// In-memory deployment (dev/tests): stores share one outbox table, the
/// dispatcher runs against the same rows the module "transactions" append to.
pub fn build_in_memory(config: DispatcherConfig) -> (AppServices, DispatcherHandle) {
    let outbox = InMemoryOutboxStore::new();
    let basket_store: Arc<dyn BasketStore> = Arc::new(CachedBasketStore::new(
        InMemoryBasketStore::new(&outbox),
        InMemoryBasketCache::new(),
    ));
    let order_store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
    let product_store: Arc<dyn ProductStore> = Arc::new(InMemoryProductStore::new(&outbox));
    let outbox_store: Arc<dyn OutboxStore> = Arc::new(outbox);

    let bus = build_bus(basket_store.clone(), order_store.clone());
    let handle =
        OutboxDispatcher::new(outbox_store.clone(), bus, event_registry(), config).spawn();

    (
        AppServices {
            basket_store,
            order_store,
            product_store,
            outbox_store,
        },
        handle,
    )
}

/// Postgres deployment: one pool, module tables and the outbox co-located in
/// the same database.
pub fn build_postgres(pool: PgPool, config: DispatcherConfig) -> (AppServices, DispatcherHandle) {
    let basket_store: Arc<dyn BasketStore> = Arc::new(CachedBasketStore::new(
        PostgresBasketStore::new(pool.clone()),
        InMemoryBasketCache::new(),
    ));
    let order_store: Arc<dyn OrderStore> = Arc::new(PostgresOrderStore::new(pool.clone()));
    let product_store: Arc<dyn ProductStore> = Arc::new(PostgresProductStore::new(pool.clone()));
    let outbox_store: Arc<dyn OutboxStore> = Arc::new(PostgresOutboxStore::new(pool));

    let bus = build_bus(basket_store.clone(), order_store.clone());
    let handle =
        OutboxDispatcher::new(outbox_store.clone(), bus, event_registry(), config).spawn();

    (
        AppServices {
            basket_store,
            order_store,
            product_store,
            outbox_store,
        },
        handle,
    )
}
