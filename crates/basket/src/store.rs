//! Basket storage abstraction and in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use modushop_core::ProductId;
use modushop_outbox::{InMemoryOutboxStore, OutboxMessage};

use crate::cart::ShoppingCart;

/// Basket store error.
#[derive(Debug, thiserror::Error)]
pub enum BasketStoreError {
    #[error("basket not found: {0}")]
    NotFound(String),
    /// The checkout builder refused to produce an event; the transaction
    /// rolls back with nothing written.
    #[error("checkout rejected: {0}")]
    Rejected(String),
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Builds the outbox row from the cart as read inside the checkout
/// transaction, so the serialized snapshot and the deleted cart are the same
/// cart. Returning an error aborts the checkout.
pub type OutboxMessageBuilder =
    dyn Fn(&ShoppingCart) -> Result<OutboxMessage, BasketStoreError> + Send + Sync;

/// Storage for shopping carts, keyed by user name.
#[async_trait]
pub trait BasketStore: Send + Sync {
    async fn get(&self, user_name: &str) -> Result<Option<ShoppingCart>, BasketStoreError>;

    /// Insert or replace the cart for its user name.
    async fn upsert(&self, cart: &ShoppingCart) -> Result<(), BasketStoreError>;

    async fn delete(&self, user_name: &str) -> Result<(), BasketStoreError>;

    /// Overwrite the unit price of this product in every stored cart.
    /// Returns the number of carts touched; zero is a successful no-op.
    async fn update_item_price(
        &self,
        product_id: ProductId,
        price: Decimal,
    ) -> Result<u64, BasketStoreError>;

    /// Atomic checkout: load the cart, append the outbox row produced by
    /// `build`, and delete the cart, all in one transaction. Returns the cart
    /// as it was at the moment of checkout. If any step fails nothing is
    /// persisted.
    async fn checkout(
        &self,
        user_name: &str,
        build: &OutboxMessageBuilder,
    ) -> Result<ShoppingCart, BasketStoreError>;
}

#[async_trait]
impl<S> BasketStore for Arc<S>
where
    S: BasketStore + ?Sized,
{
    async fn get(&self, user_name: &str) -> Result<Option<ShoppingCart>, BasketStoreError> {
        (**self).get(user_name).await
    }

    async fn upsert(&self, cart: &ShoppingCart) -> Result<(), BasketStoreError> {
        (**self).upsert(cart).await
    }

    async fn delete(&self, user_name: &str) -> Result<(), BasketStoreError> {
        (**self).delete(user_name).await
    }

    async fn update_item_price(
        &self,
        product_id: ProductId,
        price: Decimal,
    ) -> Result<u64, BasketStoreError> {
        (**self).update_item_price(product_id, price).await
    }

    async fn checkout(
        &self,
        user_name: &str,
        build: &OutboxMessageBuilder,
    ) -> Result<ShoppingCart, BasketStoreError> {
        (**self).checkout(user_name, build).await
    }
}

/// In-memory basket store for tests/dev.
///
/// Shares the outbox rows with an [`InMemoryOutboxStore`] so the checkout
/// "transaction" lands the outbox row in the same table the dispatcher polls,
/// mirroring the co-located Postgres tables.
#[derive(Clone)]
pub struct InMemoryBasketStore {
    carts: Arc<Mutex<HashMap<String, ShoppingCart>>>,
    outbox_rows: Arc<Mutex<Vec<OutboxMessage>>>,
    fail_outbox_append: Arc<AtomicBool>,
}

impl InMemoryBasketStore {
    pub fn new(outbox: &InMemoryOutboxStore) -> Self {
        Self {
            carts: Arc::new(Mutex::new(HashMap::new())),
            outbox_rows: outbox.rows(),
            fail_outbox_append: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the next checkout fail after reading the cart but before any
    /// write, to exercise transaction rollback behavior in tests.
    pub fn fail_next_outbox_append(&self) {
        self.fail_outbox_append.store(true, Ordering::SeqCst);
    }

    fn lock_carts(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, ShoppingCart>>, BasketStoreError> {
        self.carts
            .lock()
            .map_err(|_| BasketStoreError::Storage("basket lock poisoned".into()))
    }
}

#[async_trait]
impl BasketStore for InMemoryBasketStore {
    async fn get(&self, user_name: &str) -> Result<Option<ShoppingCart>, BasketStoreError> {
        Ok(self.lock_carts()?.get(user_name).cloned())
    }

    async fn upsert(&self, cart: &ShoppingCart) -> Result<(), BasketStoreError> {
        self.lock_carts()?
            .insert(cart.user_name().to_owned(), cart.clone());
        Ok(())
    }

    async fn delete(&self, user_name: &str) -> Result<(), BasketStoreError> {
        self.lock_carts()?.remove(user_name);
        Ok(())
    }

    async fn update_item_price(
        &self,
        product_id: ProductId,
        price: Decimal,
    ) -> Result<u64, BasketStoreError> {
        let mut carts = self.lock_carts()?;
        let mut touched = 0;
        for cart in carts.values_mut() {
            if cart.update_item_price(product_id, price) > 0 {
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn checkout(
        &self,
        user_name: &str,
        build: &OutboxMessageBuilder,
    ) -> Result<ShoppingCart, BasketStoreError> {
        // Both locks held for the duration: the whole read/append/delete is
        // one critical section, like the Postgres transaction it stands for.
        let mut carts = self.lock_carts()?;
        let cart = carts
            .get(user_name)
            .cloned()
            .ok_or_else(|| BasketStoreError::NotFound(user_name.to_owned()))?;

        let message = build(&cart)?;

        if self.fail_outbox_append.swap(false, Ordering::SeqCst) {
            return Err(BasketStoreError::Storage("injected outbox failure".into()));
        }

        self.outbox_rows
            .lock()
            .map_err(|_| BasketStoreError::Storage("outbox lock poisoned".into()))?
            .push(message);
        carts.remove(user_name);
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modushop_outbox::OutboxStore;

    fn seeded_store() -> (InMemoryBasketStore, InMemoryOutboxStore, ShoppingCart) {
        let outbox = InMemoryOutboxStore::new();
        let store = InMemoryBasketStore::new(&outbox);
        let mut cart = ShoppingCart::new("alice").unwrap();
        cart.add_item(ProductId::new(), 3, "black", Decimal::from(10), "cable")
            .unwrap();
        (store, outbox, cart)
    }

    #[tokio::test]
    async fn checkout_appends_outbox_row_and_deletes_cart() {
        let (store, outbox, cart) = seeded_store();
        store.upsert(&cart).await.unwrap();

        let out = store
            .checkout("alice", &|c| {
                Ok(OutboxMessage::new("t", c.total_price().to_string()))
            })
            .await
            .unwrap();

        assert_eq!(out.total_price(), Decimal::from(30));
        assert!(store.get("alice").await.unwrap().is_none());

        let pending = outbox.fetch_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content, "30");
    }

    #[tokio::test]
    async fn failed_checkout_leaves_cart_and_outbox_untouched() {
        let (store, outbox, cart) = seeded_store();
        store.upsert(&cart).await.unwrap();
        store.fail_next_outbox_append();

        let err = store
            .checkout("alice", &|c| {
                Ok(OutboxMessage::new("t", c.total_price().to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BasketStoreError::Storage(_)));

        // Nothing happened: cart survives, no outbox row.
        assert!(store.get("alice").await.unwrap().is_some());
        assert!(outbox.fetch_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_of_missing_cart_is_not_found() {
        let (store, _, _) = seeded_store();
        let err = store
            .checkout("nobody", &|_| Ok(OutboxMessage::new("t", "{}")))
            .await
            .unwrap_err();
        assert!(matches!(err, BasketStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_item_price_touches_every_cart_holding_the_product() {
        let (store, _, cart) = seeded_store();
        let product = cart.items()[0].product_id;
        store.upsert(&cart).await.unwrap();

        let mut other = ShoppingCart::new("bob").unwrap();
        other
            .add_item(product, 1, "black", Decimal::from(10), "cable")
            .unwrap();
        store.upsert(&other).await.unwrap();

        let mut unrelated = ShoppingCart::new("carol").unwrap();
        unrelated
            .add_item(ProductId::new(), 1, "red", Decimal::ONE, "mug")
            .unwrap();
        store.upsert(&unrelated).await.unwrap();

        let touched = store
            .update_item_price(product, Decimal::from(12))
            .await
            .unwrap();
        assert_eq!(touched, 2);

        let alice = store.get("alice").await.unwrap().unwrap();
        assert_eq!(alice.items()[0].unit_price, Decimal::from(12));
        let carol = store.get("carol").await.unwrap().unwrap();
        assert_eq!(carol.items()[0].unit_price, Decimal::ONE);
    }
}
