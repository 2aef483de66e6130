//! Bus-facing consumer that turns checkouts into orders.

use async_trait::async_trait;
use tracing::info;

use modushop_core::OrderId;
use modushop_events::{
    BasketCheckedOut, ConsumeError, EventConsumer, EventEnvelope, IntegrationEvent,
};

use crate::create_order::{CreateOrder, CreateOrderHandler, OrderLine};
use crate::order::{Address, Payment};
use crate::store::OrderStore;

/// Subscribes to `basket.checked_out` and creates the matching order.
///
/// The order id is derived from the event id, so redelivery of the same
/// event finds the order already present and does nothing.
pub struct BasketCheckedOutConsumer<S> {
    handler: CreateOrderHandler<S>,
}

impl<S: OrderStore> BasketCheckedOutConsumer<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CreateOrderHandler::new(store),
        }
    }
}

#[async_trait]
impl<S: OrderStore> EventConsumer for BasketCheckedOutConsumer<S> {
    fn event_type(&self) -> &'static str {
        BasketCheckedOut::EVENT_TYPE
    }

    async fn consume(&self, envelope: &EventEnvelope) -> Result<(), ConsumeError> {
        let event: BasketCheckedOut = envelope.decode()?;
        info!(event_id = %envelope.event_id(), user_name = %event.user_name, "checkout received");

        let command = create_order_command(envelope, event);
        self.handler
            .handle(command)
            .await
            .map_err(|err| ConsumeError::Handler(err.to_string()))?;
        Ok(())
    }
}

fn create_order_command(envelope: &EventEnvelope, event: BasketCheckedOut) -> CreateOrder {
    let address = Address {
        first_name: event.first_name,
        last_name: event.last_name,
        email_address: event.email_address,
        address_line: event.address_line,
        country: event.country,
        state: event.state,
        zip_code: event.zip_code,
    };

    CreateOrder {
        order_id: OrderId::derived_from_event(envelope.event_id()),
        customer_id: event.customer_id,
        user_name: event.user_name,
        items: event
            .items
            .into_iter()
            .map(|i| OrderLine {
                product_id: i.product_id,
                product_name: i.product_name,
                quantity: i.quantity,
                unit_price: i.unit_price,
            })
            .collect(),
        // Checkout captures a single address used for both.
        shipping_address: address.clone(),
        billing_address: address,
        payment: Payment {
            card_name: event.card_name,
            card_number: event.card_number,
            expiration: event.expiration,
            cvv: event.cvv,
            payment_method: event.payment_method,
        },
    }
}
