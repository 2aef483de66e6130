//! `modushop-catalog` — products and price changes.
//!
//! A price update is the module's one cross-cutting write: the new price and
//! the `ProductPriceChanged` outbox row commit in the same transaction, so
//! downstream repricing (open baskets) can never observe a price that was
//! never announced.

pub mod postgres;
pub mod product;
pub mod store;
pub mod update_price;

pub use postgres::PostgresProductStore;
pub use product::Product;
pub use store::{InMemoryProductStore, PriceChangeRecorder, ProductStore, ProductStoreError};
pub use update_price::{UpdateProductPrice, UpdateProductPriceError, UpdateProductPriceHandler};
