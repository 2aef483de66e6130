//! Order storage abstraction and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};


use async_trait::async_trait;

use modushop_core::OrderId;

use crate::order::Order;

#[derive(Debug, thiserror::Error)]
pub enum OrderStoreError {
    #[error("order not found: {0}")]
    NotFound(OrderId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An order with this id already exists; the write was a no-op.
    AlreadyExists,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the order unless one with the same id already exists. This is
    /// the idempotency seam for event-driven creation: a redelivered event
    /// derives the same order id and lands on `AlreadyExists`.
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, OrderStoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// All orders for a user name, oldest first.
    async fn list_by_user(&self, user_name: &str) -> Result<Vec<Order>, OrderStoreError>;
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, OrderStoreError> {
        (**self).insert_if_absent(order).await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, OrderStoreError> {
        (**self).get(id).await
    }

    async fn list_by_user(&self, user_name: &str) -> Result<Vec<Order>, OrderStoreError> {
        (**self).list_by_user(user_name).await
    }
}

/// In-memory order store for tests/dev.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<Mutex<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<OrderId, Order>>, OrderStoreError> {
        self.orders
            .lock()
            .map_err(|_| OrderStoreError::Storage("order lock poisoned".into()))
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, OrderStoreError> {
        let mut orders = self.lock()?;
        if orders.contains_key(&order.id()) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        orders.insert(order.id(), order.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, OrderStoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn list_by_user(&self, user_name: &str) -> Result<Vec<Order>, OrderStoreError> {
        let orders = self.lock()?;
        let mut matched: Vec<_> = orders
            .values()
            .filter(|o| o.user_name() == user_name)
            .cloned()
            .collect();
        matched.sort_by_key(|o| o.ordered_on());
        Ok(matched)
    }
}
