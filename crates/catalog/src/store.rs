//! Product storage abstraction and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use modushop_core::ProductId;
use modushop_outbox::{InMemoryOutboxStore, OutboxMessage};

use crate::product::Product;

#[derive(Debug, thiserror::Error)]
pub enum ProductStoreError {
    #[error("product not found: {0}")]
    NotFound(ProductId),
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Builds the `ProductPriceChanged` outbox row from the product as it reads
/// after the price write, inside the same transaction.
pub type PriceChangeRecorder =
    dyn Fn(&Product) -> Result<OutboxMessage, ProductStoreError> + Send + Sync;

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert(&self, product: &Product) -> Result<(), ProductStoreError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError>;

    async fn list(&self) -> Result<Vec<Product>, ProductStoreError>;

    /// Products carrying the given category, ordered by name.
    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, ProductStoreError>;

    /// Update name/categories/description/image. Price is not touched here;
    /// it has its own announced write path.
    async fn update_details(&self, product: &Product) -> Result<(), ProductStoreError>;

    /// Atomic price update: write the new price and append the outbox row
    /// produced by `record` in one transaction. Returns the updated product.
    async fn update_price(
        &self,
        id: ProductId,
        price: Decimal,
        record: &PriceChangeRecorder,
    ) -> Result<Product, ProductStoreError>;

    /// Remove a product from the catalog.
    async fn delete(&self, id: ProductId) -> Result<(), ProductStoreError>;
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn insert(&self, product: &Product) -> Result<(), ProductStoreError> {
        (**self).insert(product).await
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<Product>, ProductStoreError> {
        (**self).list().await
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, ProductStoreError> {
        (**self).list_by_category(category).await
    }

    async fn update_details(&self, product: &Product) -> Result<(), ProductStoreError> {
        (**self).update_details(product).await
    }

    async fn update_price(
        &self,
        id: ProductId,
        price: Decimal,
        record: &PriceChangeRecorder,
    ) -> Result<Product, ProductStoreError> {
        (**self).update_price(id, price, record).await
    }

    async fn delete(&self, id: ProductId) -> Result<(), ProductStoreError> {
        (**self).delete(id).await
    }
}

/// In-memory product store for tests/dev. Shares its outbox rows with an
/// [`InMemoryOutboxStore`] the same way the basket store does.
#[derive(Clone)]
pub struct InMemoryProductStore {
    products: Arc<Mutex<HashMap<ProductId, Product>>>,
    outbox_rows: Arc<Mutex<Vec<OutboxMessage>>>,
}

impl InMemoryProductStore {
    pub fn new(outbox: &InMemoryOutboxStore) -> Self {
        Self {
            products: Arc::new(Mutex::new(HashMap::new())),
            outbox_rows: outbox.rows(),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ProductId, Product>>, ProductStoreError> {
        self.products
            .lock()
            .map_err(|_| ProductStoreError::Storage("product lock poisoned".into()))
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, product: &Product) -> Result<(), ProductStoreError> {
        self.lock()?.insert(product.id, product.clone());
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, ProductStoreError> {
        let mut products: Vec<_> = self.lock()?.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, ProductStoreError> {
        let mut products: Vec<_> = self
            .lock()?
            .values()
            .filter(|p| p.categories.iter().any(|c| c == category))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn update_details(&self, product: &Product) -> Result<(), ProductStoreError> {
        let mut products = self.lock()?;
        let existing = products
            .get_mut(&product.id)
            .ok_or(ProductStoreError::NotFound(product.id))?;
        existing.name = product.name.clone();
        existing.categories = product.categories.clone();
        existing.description = product.description.clone();
        existing.image_file = product.image_file.clone();
        Ok(())
    }

    async fn update_price(
        &self,
        id: ProductId,
        price: Decimal,
        record: &PriceChangeRecorder,
    ) -> Result<Product, ProductStoreError> {
        let mut products = self.lock()?;
        let product = products
            .get_mut(&id)
            .ok_or(ProductStoreError::NotFound(id))?;

        let mut updated = product.clone();
        updated.price = price;
        let message = record(&updated)?;

        self.outbox_rows
            .lock()
            .map_err(|_| ProductStoreError::Storage("outbox lock poisoned".into()))?
            .push(message);
        *product = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: ProductId) -> Result<(), ProductStoreError> {
        self.lock()?
            .remove(&id)
            .map(|_| ())
            .ok_or(ProductStoreError::NotFound(id))
    }
}
