//! `modushop-basket` — shopping carts and the checkout workflow.
//!
//! Checkout is the one operation here with real failure semantics: it deletes
//! the cart and appends a `BasketCheckedOut` outbox row in a single database
//! transaction, and never talks to the bus directly.

pub mod cache;
pub mod cart;
pub mod checkout;
pub mod consumer;
pub mod postgres;
pub mod store;
pub mod update_price;

pub use cache::{BasketCache, CacheError, CachedBasketStore, InMemoryBasketCache};
pub use cart::{CartItem, ShoppingCart};
pub use checkout::{CheckoutBasket, CheckoutBasketHandler, CheckoutError, CheckoutReceipt};
pub use consumer::ProductPriceChangedConsumer;
pub use postgres::PostgresBasketStore;
pub use store::{BasketStore, BasketStoreError, InMemoryBasketStore, OutboxMessageBuilder};
pub use update_price::{UpdateItemPrice, UpdateItemPriceError, UpdateItemPriceHandler};
