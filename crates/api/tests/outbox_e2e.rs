//! End-to-end outbox flow, driven cycle by cycle for determinism.
//!
//! Exercises the whole chain without HTTP: checkout commits an outbox row,
//! the dispatcher publishes it, the ordering consumer creates the order, and
//! redelivery creates nothing new.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::watch;

use modushop_basket::{
    BasketStore, CheckoutBasket, CheckoutBasketHandler, InMemoryBasketStore, ShoppingCart,
};
use modushop_core::{CustomerId, OrderId, ProductId};
use modushop_events::{BasketCheckedOut, EventEnvelope, InProcessEventBus};
use modushop_ordering::{BasketCheckedOutConsumer, InMemoryOrderStore, OrderStore};
use modushop_outbox::{
    DispatcherConfig, InMemoryOutboxStore, OutboxDispatcher, OutboxStore,
};

fn idle_shutdown() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    Box::leak(Box::new(tx));
    rx
}

fn checkout_command(user: &str) -> CheckoutBasket {
    CheckoutBasket {
        user_name: user.into(),
        customer_id: CustomerId::new(),
        first_name: "Alice".into(),
        last_name: "Smith".into(),
        email_address: "alice@example.com".into(),
        address_line: "1 Main St".into(),
        country: "US".into(),
        state: "WA".into(),
        zip_code: "98101".into(),
        card_name: "Alice Smith".into(),
        card_number: "4111111111111111".into(),
        expiration: "12/27".into(),
        cvv: "123".into(),
        payment_method: 1,
    }
}

#[tokio::test]
async fn checkout_flows_through_outbox_to_exactly_one_order() {
    let outbox = InMemoryOutboxStore::new();
    let basket_store = InMemoryBasketStore::new(&outbox);
    let order_store = InMemoryOrderStore::new();

    let bus = Arc::new(
        InProcessEventBus::new()
            .subscribe(Arc::new(BasketCheckedOutConsumer::new(order_store.clone()))),
    );
    let dispatcher = OutboxDispatcher::new(
        outbox.clone(),
        bus,
        modushop_api::app::services::event_registry(),
        DispatcherConfig::default(),
    );

    let mut cart = ShoppingCart::new("alice").unwrap();
    cart.add_item(
        ProductId::new(),
        3,
        "black",
        Decimal::new(1000, 2),
        "cable",
    )
    .unwrap();
    basket_store.upsert(&cart).await.unwrap();

    let receipt = CheckoutBasketHandler::new(basket_store.clone())
        .handle(checkout_command("alice"))
        .await
        .unwrap();
    assert_eq!(receipt.total_price, Decimal::new(3000, 2));

    // Committed but not yet published: no order until the dispatcher runs.
    assert!(order_store.list_by_user("alice").await.unwrap().is_empty());
    let pending = outbox.fetch_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    let event: BasketCheckedOut = serde_json::from_str(&pending[0].content).unwrap();
    assert_eq!(event.total_price, Decimal::new(3000, 2));

    let shutdown = idle_shutdown();
    let stats = dispatcher.run_cycle(&shutdown).await.unwrap();
    assert_eq!(stats.published, 1);

    let orders = order_store.list_by_user("alice").await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].total_price(), Decimal::new(3000, 2));
    assert_eq!(orders[0].items()[0].quantity, 3);

    // Second cycle over the processed batch publishes nothing.
    let stats = dispatcher.run_cycle(&shutdown).await.unwrap();
    assert_eq!(stats.fetched, 0);
    assert_eq!(order_store.list_by_user("alice").await.unwrap().len(), 1);
}

#[tokio::test]
async fn redelivered_checkout_event_creates_no_second_order() {
    let order_store = InMemoryOrderStore::new();
    let consumer = BasketCheckedOutConsumer::new(order_store.clone());

    let event = BasketCheckedOut {
        user_name: "alice".into(),
        customer_id: CustomerId::new(),
        total_price: Decimal::from(30),
        first_name: "Alice".into(),
        last_name: "Smith".into(),
        email_address: "alice@example.com".into(),
        address_line: "1 Main St".into(),
        country: "US".into(),
        state: "WA".into(),
        zip_code: "98101".into(),
        card_name: "Alice Smith".into(),
        card_number: "4111111111111111".into(),
        expiration: "12/27".into(),
        cvv: "123".into(),
        payment_method: 1,
        items: vec![modushop_events::CheckoutLineItem {
            product_id: ProductId::new(),
            product_name: "cable".into(),
            color: "black".into(),
            quantity: 3,
            unit_price: Decimal::from(10),
        }],
    };
    let envelope = EventEnvelope::for_event(&event).unwrap();

    use modushop_events::EventConsumer;
    consumer.consume(&envelope).await.unwrap();
    consumer.consume(&envelope).await.unwrap();

    assert_eq!(order_store.list_by_user("alice").await.unwrap().len(), 1);
    let derived = OrderId::derived_from_event(envelope.event_id());
    assert!(order_store.get(derived).await.unwrap().is_some());
}
