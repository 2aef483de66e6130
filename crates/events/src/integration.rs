//! Concrete integration events exchanged between modules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use modushop_core::{CustomerId, ProductId};

use crate::event::IntegrationEvent;

/// One basket line as captured at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub color: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Raised by the Basket module when a checkout commits.
///
/// Carries everything the Ordering module needs to build an order locally:
/// identity, computed total, addresses, payment, and the line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketCheckedOut {
    pub user_name: String,
    pub customer_id: CustomerId,
    pub total_price: Decimal,

    // Shipping and billing address
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub address_line: String,
    pub country: String,
    pub state: String,
    pub zip_code: String,

    // Payment
    pub card_name: String,
    pub card_number: String,
    pub expiration: String,
    pub cvv: String,
    pub payment_method: i32,

    pub items: Vec<CheckoutLineItem>,
}

impl IntegrationEvent for BasketCheckedOut {
    const EVENT_TYPE: &'static str = "basket.checked_out";
}

/// Raised by the Catalog module when a product price changes.
///
/// The Basket module consumes this to reprice open carts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceChanged {
    pub product_id: ProductId,
    pub name: String,
    pub categories: Vec<String>,
    pub description: String,
    pub image_file: String,
    pub price: Decimal,
}

impl IntegrationEvent for ProductPriceChanged {
    const EVENT_TYPE: &'static str = "catalog.product_price_changed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_discriminators_are_stable() {
        // These strings are persisted in outbox rows; changing them breaks
        // replay of any still-pending message.
        assert_eq!(BasketCheckedOut::EVENT_TYPE, "basket.checked_out");
        assert_eq!(
            ProductPriceChanged::EVENT_TYPE,
            "catalog.product_price_changed"
        );
    }
}
