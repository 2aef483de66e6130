//! Checkout workflow: validate, snapshot, commit.
//!
//! The handler never touches the event bus. The `BasketCheckedOut` event is
//! appended to the outbox inside the store's checkout transaction and picked
//! up by the dispatcher later.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use modushop_core::{CustomerId, DomainError};
use modushop_events::{BasketCheckedOut, CheckoutLineItem};
use modushop_outbox::OutboxMessage;

use crate::cart::ShoppingCart;
use crate::store::{BasketStore, BasketStoreError};

/// Checkout command: who is paying, where it ships, how it is paid.
/// Prices are never taken from the caller; the stored cart is authoritative.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutBasket {
    pub user_name: String,
    pub customer_id: CustomerId,

    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub address_line: String,
    pub country: String,
    pub state: String,
    pub zip_code: String,

    pub card_name: String,
    pub card_number: String,
    pub expiration: String,
    pub cvv: String,
    pub payment_method: i32,
}

impl CheckoutBasket {
    /// Collects every missing field rather than failing on the first.
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("user_name", &self.user_name),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email_address", &self.email_address),
            ("address_line", &self.address_line),
            ("country", &self.country),
            ("zip_code", &self.zip_code),
            ("card_name", &self.card_name),
            ("card_number", &self.card_number),
            ("expiration", &self.expiration),
            ("cvv", &self.cvv),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
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

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("no basket for user {0}")]
    BasketNotFound(String),
    #[error("basket for user {0} is empty")]
    EmptyBasket(String),
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Store(BasketStoreError),
}

impl From<BasketStoreError> for CheckoutError {
    fn from(err: BasketStoreError) -> Self {
        match err {
            BasketStoreError::NotFound(user) => CheckoutError::BasketNotFound(user),
            other => CheckoutError::Store(other),
        }
    }
}

/// What the caller gets back once the checkout transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutReceipt {
    pub user_name: String,
    pub total_price: Decimal,
}

pub struct CheckoutBasketHandler<S> {
    store: S,
}

impl<S: BasketStore> CheckoutBasketHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(user_name = %command.user_name))]
    pub async fn handle(&self, command: CheckoutBasket) -> Result<CheckoutReceipt, CheckoutError> {
        command.validate()?;

        let user_name = command.user_name.clone();
        let cart = self
            .store
            .checkout(&user_name, &move |cart: &ShoppingCart| {
                if cart.is_empty() {
                    return Err(BasketStoreError::Rejected("empty basket".into()));
                }
                let event = checked_out_event(&command, cart);
                Ok(OutboxMessage::for_event(&event)?)
            })
            .await
            .map_err(|err| {
                warn!(error = %err, "checkout rolled back");
                match err {
                    BasketStoreError::Rejected(_) => CheckoutError::EmptyBasket(user_name.clone()),
                    other => CheckoutError::from(other),
                }
            })?;

        let receipt = CheckoutReceipt {
            user_name: cart.user_name().to_owned(),
            total_price: cart.total_price(),
        };
        info!(total_price = %receipt.total_price, "basket checked out");
        Ok(receipt)
    }
}

fn checked_out_event(command: &CheckoutBasket, cart: &ShoppingCart) -> BasketCheckedOut {
    BasketCheckedOut {
        user_name: cart.user_name().to_owned(),
        customer_id: command.customer_id,
        total_price: cart.total_price(),
        first_name: command.first_name.clone(),
        last_name: command.last_name.clone(),
        email_address: command.email_address.clone(),
        address_line: command.address_line.clone(),
        country: command.country.clone(),
        state: command.state.clone(),
        zip_code: command.zip_code.clone(),
        card_name: command.card_name.clone(),
        card_number: command.card_number.clone(),
        expiration: command.expiration.clone(),
        cvv: command.cvv.clone(),
        payment_method: command.payment_method,
        items: cart
            .items()
            .iter()
            .map(|i| CheckoutLineItem {
                product_id: i.product_id,
                product_name: i.product_name.clone(),
                color: i.color.clone(),
                quantity: i.quantity,
                unit_price: i.unit_price,
            })
            .collect(),
    }
}
