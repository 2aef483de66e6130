//! `modushop-events` — integration events and the bus abstraction.
//!
//! Integration events are the messages that cross module boundaries; they are
//! distinct from domain events, which never leave the module that raised them.
//! This crate defines the event contract, the JSON wire envelope, an explicit
//! deserializer registry, and the async publish/subscribe bus abstraction.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_process_bus;
pub mod integration;
pub mod registry;

pub use bus::{ConsumeError, EventConsumer, IntegrationEventBus, PublishError};
pub use envelope::EventEnvelope;
pub use event::IntegrationEvent;
pub use in_process_bus::InProcessEventBus;
pub use integration::{BasketCheckedOut, CheckoutLineItem, ProductPriceChanged};
pub use registry::{DecodeError, EventRegistry};
