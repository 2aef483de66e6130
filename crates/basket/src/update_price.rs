//! Reprice open carts after a catalog price change.

use rust_decimal::Decimal;
use tracing::{info, instrument};

use modushop_core::{DomainError, ProductId};

use crate::store::{BasketStore, BasketStoreError};

#[derive(Debug, Clone)]
pub struct UpdateItemPrice {
    pub product_id: ProductId,
    pub price: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateItemPriceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] BasketStoreError),
}

pub struct UpdateItemPriceHandler<S> {
    store: S,
}

impl<S: BasketStore> UpdateItemPriceHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Absolute price write across all carts, so replaying the same event is
    /// harmless. Zero carts touched is a success.
    #[instrument(skip_all, fields(product_id = %command.product_id, price = %command.price))]
    pub async fn handle(&self, command: UpdateItemPrice) -> Result<u64, UpdateItemPriceError> {
        if command.price <= Decimal::ZERO {
            return Err(DomainError::validation("price", "must be positive").into());
        }

        let touched = self
            .store
            .update_item_price(command.product_id, command.price)
            .await?;
        info!(carts = touched, "cart prices updated");
        Ok(touched)
    }
}
