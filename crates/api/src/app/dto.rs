//! Request/response DTOs and mapping to/from domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use modushop_basket::{CartItem, CheckoutReceipt, ShoppingCart};
use modushop_catalog::Product;
use modushop_core::{CustomerId, OrderId, ProductId};
use modushop_ordering::Order;
use modushop_outbox::OutboxMessage;

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub color: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct StoreBasketRequest {
    pub user_name: String,
    #[serde(default)]
    pub items: Vec<CartItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub color: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl From<&CartItem> for CartItemResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            color: item.color.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BasketResponse {
    pub user_name: String,
    pub items: Vec<CartItemResponse>,
    pub total_price: Decimal,
}

impl From<&ShoppingCart> for BasketResponse {
    fn from(cart: &ShoppingCart) -> Self {
        Self {
            user_name: cart.user_name().to_owned(),
            items: cart.items().iter().map(CartItemResponse::from).collect(),
            total_price: cart.total_price(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_name: String,
    pub customer_id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub address_line: String,
    pub country: String,
    #[serde(default)]
    pub state: String,
    pub zip_code: String,
    pub card_name: String,
    pub card_number: String,
    pub expiration: String,
    pub cvv: String,
    pub payment_method: i32,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub user_name: String,
    pub total_price: Decimal,
}

impl From<CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            user_name: receipt.user_name,
            total_price: receipt.total_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub user_name: String,
    pub items: Vec<OrderItemResponse>,
    pub total_price: Decimal,
    pub ordered_on: chrono::DateTime<chrono::Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            customer_id: order.customer_id(),
            user_name: order.user_name().to_owned(),
            items: order
                .items()
                .iter()
                .map(|i| OrderItemResponse {
                    product_id: i.product_id,
                    product_name: i.product_name.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
            total_price: order.total_price(),
            ordered_on: order.ordered_on(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_file: String,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_file: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub categories: Vec<String>,
    pub description: String,
    pub image_file: String,
    pub price: Decimal,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            categories: product.categories.clone(),
            description: product.description.clone(),
            image_file: product.image_file.clone(),
            price: product.price,
        }
    }
}

/// Operator view of a dead-lettered outbox row. Content stays opaque.
#[derive(Debug, Serialize)]
pub struct DeadLetterResponse {
    pub id: String,
    pub event_type: String,
    pub occurred_on: chrono::DateTime<chrono::Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub dead_lettered_on: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&OutboxMessage> for DeadLetterResponse {
    fn from(message: &OutboxMessage) -> Self {
        Self {
            id: message.id.to_string(),
            event_type: message.event_type.clone(),
            occurred_on: message.occurred_on,
            attempts: message.attempts,
            last_error: message.last_error.clone(),
            dead_lettered_on: message.dead_lettered_on,
        }
    }
}
