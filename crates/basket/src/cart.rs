use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use modushop_core::{DomainError, ProductId};

/// One line in a shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub color: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Aggregate root: a customer's open shopping cart, keyed by user name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCart {
    id: Uuid,
    user_name: String,
    items: Vec<CartItem>,
}

impl ShoppingCart {
    pub fn new(user_name: impl Into<String>) -> Result<Self, DomainError> {
        let user_name = user_name.into();
        if user_name.trim().is_empty() {
            return Err(DomainError::validation("user_name", "is required"));
        }
        Ok(Self {
            id: Uuid::now_v7(),
            user_name,
            items: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of price × quantity over all items, decimal arithmetic throughout.
    pub fn total_price(&self) -> Decimal {
        self.items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum()
    }

    /// Add an item; an existing line for the same product merges quantities.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        color: impl Into<String>,
        unit_price: Decimal,
        product_name: impl Into<String>,
    ) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity", "must be positive"));
        }
        if unit_price <= Decimal::ZERO {
            return Err(DomainError::validation("unit_price", "must be positive"));
        }

        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| DomainError::validation("quantity", "exceeds the maximum"))?;
        } else {
            self.items.push(CartItem {
                product_id,
                product_name: product_name.into(),
                color: color.into(),
                quantity,
                unit_price,
            });
        }
        Ok(())
    }

    /// Remove the line for a product; removing an absent product is a no-op.
    pub fn remove_item(&mut self, product_id: ProductId) {
        self.items.retain(|i| i.product_id != product_id);
    }

    /// Overwrite the unit price on every line for this product. Returns how
    /// many lines changed. Absolute write, so repeating it is idempotent.
    pub fn update_item_price(&mut self, product_id: ProductId, price: Decimal) -> usize {
        let mut changed = 0;
        for item in self.items.iter_mut().filter(|i| i.product_id == product_id) {
            item.unit_price = price;
            changed += 1;
        }
        changed
    }

    /// Rebuild a cart from stored parts.
    pub fn from_parts(id: Uuid, user_name: String, items: Vec<CartItem>) -> Self {
        Self {
            id,
            user_name,
            items,
        }
    }
}
