//! `modushop-ordering` — orders created from checked-out baskets.
//!
//! The module has no synchronous dependency on Basket: orders are created by
//! consuming `basket.checked_out` events off the bus. Creation is idempotent
//! under redelivery because the order id is derived from the event id.

pub mod consumer;
pub mod create_order;
pub mod order;
pub mod postgres;
pub mod store;

pub use consumer::BasketCheckedOutConsumer;
pub use create_order::{CreateOrder, CreateOrderError, CreateOrderHandler, OrderLine};
pub use order::{Address, Order, OrderItem, Payment};
pub use postgres::PostgresOrderStore;
pub use store::{InMemoryOrderStore, InsertOutcome, OrderStore, OrderStoreError};
