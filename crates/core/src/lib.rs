//! `modushop-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult, FieldError};
pub use id::{CustomerId, OrderId, ProductId};

/// Monetary amount with currency precision.
///
/// All prices and totals in the system use decimal arithmetic; never floats.
pub type Money = rust_decimal::Decimal;
