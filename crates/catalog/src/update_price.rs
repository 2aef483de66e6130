//! Product price update: the write and its announcement commit together.

use rust_decimal::Decimal;
use tracing::{info, instrument};

use modushop_core::{DomainError, ProductId};
use modushop_events::ProductPriceChanged;
use modushop_outbox::OutboxMessage;

use crate::product::Product;
use crate::store::{ProductStore, ProductStoreError};

#[derive(Debug, Clone)]
pub struct UpdateProductPrice {
    pub product_id: ProductId,
    pub price: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateProductPriceError {
    #[error("product not found: {0}")]
    NotFound(ProductId),
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Store(ProductStoreError),
}

impl From<ProductStoreError> for UpdateProductPriceError {
    fn from(err: ProductStoreError) -> Self {
        match err {
            ProductStoreError::NotFound(id) => UpdateProductPriceError::NotFound(id),
            other => UpdateProductPriceError::Store(other),
        }
    }
}

pub struct UpdateProductPriceHandler<S> {
    store: S,
}

impl<S: ProductStore> UpdateProductPriceHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(product_id = %command.product_id, price = %command.price))]
    pub async fn handle(
        &self,
        command: UpdateProductPrice,
    ) -> Result<Product, UpdateProductPriceError> {
        if command.price <= Decimal::ZERO {
            return Err(DomainError::validation("price", "must be positive").into());
        }

        let product = self
            .store
            .update_price(command.product_id, command.price, &|product: &Product| {
                let event = price_changed_event(product);
                Ok(OutboxMessage::for_event(&event)?)
            })
            .await?;

        info!("product price updated");
        Ok(product)
    }
}

fn price_changed_event(product: &Product) -> ProductPriceChanged {
    ProductPriceChanged {
        product_id: product.id,
        name: product.name.clone(),
        categories: product.categories.clone(),
        description: product.description.clone(),
        image_file: product.image_file.clone(),
        price: product.price,
    }
}
