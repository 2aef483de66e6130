//! Order aggregate and its value objects.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use modushop_core::{CustomerId, DomainError, OrderId, ProductId};

/// Shipping / billing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub address_line: String,
    pub country: String,
    pub state: String,
    pub zip_code: String,
}

impl Address {
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email_address", &self.email_address),
            ("address_line", &self.address_line),
            ("country", &self.country),
            ("zip_code", &self.zip_code),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(f, _)| *f)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation_many(
                missing.into_iter().map(|f| (f, "is required")),
            ))
        }
    }
}

/// Payment details as captured at checkout. Stored, never charged here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub card_name: String,
    pub card_number: String,
    pub expiration: String,
    pub cvv: String,
    pub payment_method: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// An order as placed. Immutable once created; there is no order-editing
/// workflow here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    user_name: String,
    items: Vec<OrderItem>,
    shipping_address: Address,
    billing_address: Address,
    payment: Payment,
    ordered_on: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        id: OrderId,
        customer_id: CustomerId,
        user_name: impl Into<String>,
        items: Vec<OrderItem>,
        shipping_address: Address,
        billing_address: Address,
        payment: Payment,
    ) -> Result<Self, DomainError> {
        let user_name = user_name.into();
        if user_name.trim().is_empty() {
            return Err(DomainError::validation("user_name", "is required"));
        }
        if items.is_empty() {
            return Err(DomainError::invariant("an order must have items"));
        }
        shipping_address.validate()?;
        billing_address.validate()?;

        Ok(Self {
            id,
            customer_id,
            user_name,
            items,
            shipping_address,
            billing_address,
            payment,
            ordered_on: Utc::now(),
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn ordered_on(&self) -> DateTime<Utc> {
        self.ordered_on
    }

    /// Total is always recomputed from the lines, never stored.
    pub fn total_price(&self) -> Decimal {
        self.items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: OrderId,
        customer_id: CustomerId,
        user_name: String,
        items: Vec<OrderItem>,
        shipping_address: Address,
        billing_address: Address,
        payment: Payment,
        ordered_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            user_name,
            items,
            shipping_address,
            billing_address,
            payment,
            ordered_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn address() -> Address {
        Address {
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            email_address: "alice@example.com".into(),
            address_line: "1 Main St".into(),
            country: "US".into(),
            state: "WA".into(),
            zip_code: "98101".into(),
        }
    }

    fn payment() -> Payment {
        Payment {
            card_name: "Alice Smith".into(),
            card_number: "4111111111111111".into(),
            expiration: "12/27".into(),
            cvv: "123".into(),
            payment_method: 1,
        }
    }

    fn item(price: i64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(),
            product_name: "thing".into(),
            quantity,
            unit_price: Decimal::from(price),
        }
    }

    #[test]
    fn total_recomputed_from_lines() {
        let order = Order::place(
            OrderId::new(),
            CustomerId::new(),
            "alice",
            vec![item(500, 2), item(400, 1)],
            address(),
            address(),
            payment(),
        )
        .unwrap();
        assert_eq!(order.total_price(), Decimal::from(1400));
    }

    #[test]
    fn order_without_items_is_rejected() {
        let err = Order::place(
            OrderId::new(),
            CustomerId::new(),
            "alice",
            vec![],
            address(),
            address(),
            payment(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn incomplete_address_is_rejected() {
        let mut bad = address();
        bad.zip_code.clear();
        let err = Order::place(
            OrderId::new(),
            CustomerId::new(),
            "alice",
            vec![item(10, 1)],
            bad,
            address(),
            payment(),
        )
        .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "zip_code");
    }
}
