use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::IntoResponse,
    routing::get,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn health() -> axum::response::Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

pub fn outbox_router() -> Router {
    Router::new().route("/dead-letters", get(list_dead_letters))
}

/// Operator endpoint: messages that exhausted their retries.
async fn list_dead_letters(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.outbox_store.list_dead_lettered(100).await {
        Ok(messages) => Json(
            messages
                .iter()
                .map(dto::DeadLetterResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::internal(e.to_string()),
    }
}
