//! Order creation command and handler.

use rust_decimal::Decimal;
use tracing::{info, instrument};

use modushop_core::{CustomerId, DomainError, OrderId, ProductId};

use crate::order::{Address, Order, OrderItem, Payment};
use crate::store::{InsertOutcome, OrderStore, OrderStoreError};

/// One requested order line.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Create an order with a caller-chosen id.
///
/// The id is part of the command so event-driven callers can derive it
/// deterministically; creating the same id twice is a no-op.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub user_name: String,
    pub items: Vec<OrderLine>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment: Payment,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateOrderError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] OrderStoreError),
}

pub struct CreateOrderHandler<S> {
    store: S,
}

impl<S: OrderStore> CreateOrderHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the order id and whether this call actually created it.
    #[instrument(skip_all, fields(order_id = %command.order_id, user_name = %command.user_name))]
    pub async fn handle(
        &self,
        command: CreateOrder,
    ) -> Result<(OrderId, InsertOutcome), CreateOrderError> {
        let items = command
            .items
            .into_iter()
            .map(|line| OrderItem {
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let order = Order::place(
            command.order_id,
            command.customer_id,
            command.user_name,
            items,
            command.shipping_address,
            command.billing_address,
            command.payment,
        )?;

        let outcome = self.store.insert_if_absent(&order).await?;
        match outcome {
            InsertOutcome::Inserted => {
                info!(total_price = %order.total_price(), "order created");
            }
            InsertOutcome::AlreadyExists => {
                info!("order already exists, skipping");
            }
        }
        Ok((order.id(), outcome))
    }
}
