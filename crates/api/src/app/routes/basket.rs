use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};

use modushop_basket::{
    BasketStoreError, CheckoutBasket, CheckoutBasketHandler, CheckoutError, ShoppingCart,
};
use modushop_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(store_basket))
        .route("/checkout", post(checkout))
        .route(
            "/:user_name",
            axum::routing::get(get_basket).delete(delete_basket),
        )
        .route("/:user_name/items", post(add_item))
        .route("/:user_name/items/:product_id", delete(remove_item))
}

async fn store_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::StoreBasketRequest>,
) -> axum::response::Response {
    let mut cart = match ShoppingCart::new(body.user_name) {
        Ok(cart) => cart,
        Err(e) => return errors::domain_error_response(&e),
    };
    for item in body.items {
        if let Err(e) = cart.add_item(
            item.product_id,
            item.quantity,
            item.color,
            item.unit_price,
            item.product_name,
        ) {
            return errors::domain_error_response(&e);
        }
    }

    if let Err(e) = services.basket_store.upsert(&cart).await {
        return errors::internal(e.to_string());
    }
    (StatusCode::CREATED, Json(dto::BasketResponse::from(&cart))).into_response()
}

async fn get_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_name): Path<String>,
) -> axum::response::Response {
    match services.basket_store.get(&user_name).await {
        Ok(Some(cart)) => Json(dto::BasketResponse::from(&cart)).into_response(),
        Ok(None) => errors::not_found(format!("no basket for user {user_name}")),
        Err(e) => errors::internal(e.to_string()),
    }
}

async fn delete_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_name): Path<String>,
) -> axum::response::Response {
    match services.basket_store.delete(&user_name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::internal(e.to_string()),
    }
}

async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_name): Path<String>,
    Json(body): Json<dto::CartItemRequest>,
) -> axum::response::Response {
    let mut cart = match services.basket_store.get(&user_name).await {
        Ok(Some(cart)) => cart,
        Ok(None) => match ShoppingCart::new(user_name) {
            Ok(cart) => cart,
            Err(e) => return errors::domain_error_response(&e),
        },
        Err(e) => return errors::internal(e.to_string()),
    };

    if let Err(e) = cart.add_item(
        body.product_id,
        body.quantity,
        body.color,
        body.unit_price,
        body.product_name,
    ) {
        return errors::domain_error_response(&e);
    }

    if let Err(e) = services.basket_store.upsert(&cart).await {
        return errors::internal(e.to_string());
    }
    Json(dto::BasketResponse::from(&cart)).into_response()
}

async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((user_name, product_id)): Path<(String, ProductId)>,
) -> axum::response::Response {
    let mut cart = match services.basket_store.get(&user_name).await {
        Ok(Some(cart)) => cart,
        Ok(None) => return errors::not_found(format!("no basket for user {user_name}")),
        Err(e) => return errors::internal(e.to_string()),
    };

    cart.remove_item(product_id);
    if let Err(e) = services.basket_store.upsert(&cart).await {
        return errors::internal(e.to_string());
    }
    Json(dto::BasketResponse::from(&cart)).into_response()
}

async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    let command = CheckoutBasket {
        user_name: body.user_name,
        customer_id: body.customer_id,
        first_name: body.first_name,
        last_name: body.last_name,
        email_address: body.email_address,
        address_line: body.address_line,
        country: body.country,
        state: body.state,
        zip_code: body.zip_code,
        card_name: body.card_name,
        card_number: body.card_number,
        expiration: body.expiration,
        cvv: body.cvv,
        payment_method: body.payment_method,
    };

    let handler = CheckoutBasketHandler::new(services.basket_store.clone());
    match handler.handle(command).await {
        Ok(receipt) => (
            StatusCode::ACCEPTED,
            Json(dto::CheckoutResponse::from(receipt)),
        )
            .into_response(),
        Err(CheckoutError::BasketNotFound(user)) => {
            errors::not_found(format!("no basket for user {user}"))
        }
        Err(CheckoutError::EmptyBasket(user)) => {
            errors::not_found(format!("basket for user {user} is empty"))
        }
        Err(CheckoutError::Validation(e)) => errors::domain_error_response(&e),
        Err(CheckoutError::Store(BasketStoreError::NotFound(user))) => {
            errors::not_found(format!("no basket for user {user}"))
        }
        Err(CheckoutError::Store(e)) => errors::internal(e.to_string()),
    }
}
