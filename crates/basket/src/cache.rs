//! Read-through cache in front of a [`BasketStore`].
//!
//! The caching store is explicit composition: callers wire
//! `CachedBasketStore::new(inner, cache)` and get the same `BasketStore`
//! surface back. Cache failures never fail the request; they are logged and
//! the call falls through to the inner store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use modushop_core::ProductId;

use crate::cart::ShoppingCart;
use crate::store::{BasketStore, BasketStoreError, OutboxMessageBuilder};

#[derive(Debug, thiserror::Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

/// Key/value cache for carts, keyed by user name.
#[async_trait]
pub trait BasketCache: Send + Sync {
    async fn get(&self, user_name: &str) -> Result<Option<ShoppingCart>, CacheError>;
    async fn set(&self, cart: &ShoppingCart) -> Result<(), CacheError>;
    async fn remove(&self, user_name: &str) -> Result<(), CacheError>;
    /// Drop everything. Used after cross-cart writes (price propagation)
    /// where the touched set is unknown.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// In-memory cache for tests/dev.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBasketCache {
    entries: Arc<Mutex<HashMap<String, ShoppingCart>>>,
}

impl InMemoryBasketCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, ShoppingCart>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError("cache lock poisoned".into()))
    }
}

#[async_trait]
impl BasketCache for InMemoryBasketCache {
    async fn get(&self, user_name: &str) -> Result<Option<ShoppingCart>, CacheError> {
        Ok(self.lock()?.get(user_name).cloned())
    }

    async fn set(&self, cart: &ShoppingCart) -> Result<(), CacheError> {
        self.lock()?.insert(cart.user_name().to_owned(), cart.clone());
        Ok(())
    }

    async fn remove(&self, user_name: &str) -> Result<(), CacheError> {
        self.lock()?.remove(user_name);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.lock()?.clear();
        Ok(())
    }
}

/// `BasketStore` decorator: reads go through the cache, writes invalidate.
pub struct CachedBasketStore<S, C> {
    inner: S,
    cache: C,
}

impl<S, C> CachedBasketStore<S, C>
where
    S: BasketStore,
    C: BasketCache,
{
    pub fn new(inner: S, cache: C) -> Self {
        Self { inner, cache }
    }

    async fn invalidate(&self, user_name: &str) {
        if let Err(err) = self.cache.remove(user_name).await {
            warn!(user_name, %err, "cache invalidation failed");
        }
    }
}

#[async_trait]
impl<S, C> BasketStore for CachedBasketStore<S, C>
where
    S: BasketStore,
    C: BasketCache,
{
    async fn get(&self, user_name: &str) -> Result<Option<ShoppingCart>, BasketStoreError> {
        match self.cache.get(user_name).await {
            Ok(Some(cart)) => return Ok(Some(cart)),
            Ok(None) => {}
            Err(err) => warn!(user_name, %err, "cache read failed, falling through"),
        }

        let cart = self.inner.get(user_name).await?;
        if let Some(cart) = &cart {
            if let Err(err) = self.cache.set(cart).await {
                warn!(user_name, %err, "cache fill failed");
            }
        }
        Ok(cart)
    }

    async fn upsert(&self, cart: &ShoppingCart) -> Result<(), BasketStoreError> {
        self.inner.upsert(cart).await?;
        self.invalidate(cart.user_name()).await;
        Ok(())
    }

    async fn delete(&self, user_name: &str) -> Result<(), BasketStoreError> {
        self.inner.delete(user_name).await?;
        self.invalidate(user_name).await;
        Ok(())
    }

    async fn update_item_price(
        &self,
        product_id: ProductId,
        price: Decimal,
    ) -> Result<u64, BasketStoreError> {
        let touched = self.inner.update_item_price(product_id, price).await?;
        if touched > 0 {
            if let Err(err) = self.cache.clear().await {
                warn!(%err, "cache clear failed after price update");
            }
        }
        Ok(touched)
    }

    async fn checkout(
        &self,
        user_name: &str,
        build: &OutboxMessageBuilder,
    ) -> Result<ShoppingCart, BasketStoreError> {
        let cart = self.inner.checkout(user_name, build).await?;
        self.invalidate(user_name).await;
        Ok(cart)
    }
}
