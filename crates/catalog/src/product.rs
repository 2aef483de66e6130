//! Product entity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use modushop_core::{DomainError, ProductId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub categories: Vec<String>,
    pub description: String,
    pub image_file: String,
    pub price: Decimal,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        categories: Vec<String>,
        description: impl Into<String>,
        image_file: impl Into<String>,
        price: Decimal,
    ) -> Result<Self, DomainError> {
        let product = Self {
            id: ProductId::new(),
            name: name.into(),
            categories,
            description: description.into(),
            image_file: image_file.into(),
            price,
        };
        product.validate()?;
        Ok(product)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name", "is required"));
        }
        if self.price <= Decimal::ZERO {
            return Err(DomainError::validation("price", "must be positive"));
        }
        Ok(())
    }
}
