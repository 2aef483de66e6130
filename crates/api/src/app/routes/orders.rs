use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use modushop_core::OrderId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
}

#[derive(Debug, Deserialize)]
struct ListOrdersQuery {
    user_name: String,
}

async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<OrderId>,
) -> axum::response::Response {
    match services.order_store.get(id).await {
        Ok(Some(order)) => Json(dto::OrderResponse::from(&order)).into_response(),
        Ok(None) => errors::not_found(format!("order {id} not found")),
        Err(e) => errors::internal(e.to_string()),
    }
}

async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListOrdersQuery>,
) -> axum::response::Response {
    match services.order_store.list_by_user(&query.user_name).await {
        Ok(orders) => Json(
            orders
                .iter()
                .map(dto::OrderResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::internal(e.to_string()),
    }
}
