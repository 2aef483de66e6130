//! Bus-facing consumer for catalog price changes.

use async_trait::async_trait;
use tracing::info;

use modushop_events::{
    ConsumeError, EventConsumer, EventEnvelope, IntegrationEvent, ProductPriceChanged,
};

use crate::store::BasketStore;
use crate::update_price::{UpdateItemPrice, UpdateItemPriceHandler};

/// Subscribes to `catalog.product_price_changed` and reprices open carts.
/// Safe under redelivery: the underlying write is absolute.
pub struct ProductPriceChangedConsumer<S> {
    handler: UpdateItemPriceHandler<S>,
}

impl<S: BasketStore> ProductPriceChangedConsumer<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: UpdateItemPriceHandler::new(store),
        }
    }
}

#[async_trait]
impl<S: BasketStore> EventConsumer for ProductPriceChangedConsumer<S> {
    fn event_type(&self) -> &'static str {
        ProductPriceChanged::EVENT_TYPE
    }

    async fn consume(&self, envelope: &EventEnvelope) -> Result<(), ConsumeError> {
        let event: ProductPriceChanged = envelope.decode()?;
        info!(event_id = %envelope.event_id(), product_id = %event.product_id, "price change received");

        self.handler
            .handle(UpdateItemPrice {
                product_id: event.product_id,
                price: event.price,
            })
            .await
            .map_err(|err| ConsumeError::Handler(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modushop_core::ProductId;
    use modushop_outbox::InMemoryOutboxStore;
    use rust_decimal::Decimal;

    use crate::cart::ShoppingCart;
    use crate::store::InMemoryBasketStore;

    fn price_changed(product_id: ProductId, price: Decimal) -> ProductPriceChanged {
        ProductPriceChanged {
            product_id,
            name: "keyboard".into(),
            categories: vec![],
            description: String::new(),
            image_file: String::new(),
            price,
        }
    }

    #[tokio::test]
    async fn consuming_a_price_change_reprices_the_cart() {
        let outbox = InMemoryOutboxStore::new();
        let store = InMemoryBasketStore::new(&outbox);
        let product = ProductId::new();

        let mut cart = ShoppingCart::new("alice").unwrap();
        cart.add_item(product, 2, "black", Decimal::from(10), "keyboard")
            .unwrap();
        store.upsert(&cart).await.unwrap();

        let consumer = ProductPriceChangedConsumer::new(store.clone());
        let envelope =
            EventEnvelope::for_event(&price_changed(product, Decimal::from(15))).unwrap();

        consumer.consume(&envelope).await.unwrap();
        // Redelivery of the same envelope changes nothing further.
        consumer.consume(&envelope).await.unwrap();

        let cart = store.get("alice").await.unwrap().unwrap();
        assert_eq!(cart.total_price(), Decimal::from(30));
    }

    #[tokio::test]
    async fn invalid_price_surfaces_as_handler_error() {
        let outbox = InMemoryOutboxStore::new();
        let store = InMemoryBasketStore::new(&outbox);
        let consumer = ProductPriceChangedConsumer::new(store);

        let envelope =
            EventEnvelope::for_event(&price_changed(ProductId::new(), Decimal::ZERO)).unwrap();
        let err = consumer.consume(&envelope).await.unwrap_err();
        assert!(matches!(err, ConsumeError::Handler(_)));
    }
}
