//! Problem-detail error responses.
//!
//! Every error leaves the API as the same JSON shape: title, detail, status,
//! a per-response trace id, and field errors when validation failed.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use modushop_core::DomainError;

pub fn problem(
    status: StatusCode,
    title: &'static str,
    detail: impl Into<String>,
) -> axum::response::Response {
    let trace_id = Uuid::now_v7();
    (
        status,
        Json(json!({
            "title": title,
            "detail": detail.into(),
            "status": status.as_u16(),
            "trace_id": trace_id.to_string(),
        })),
    )
        .into_response()
}

pub fn domain_error_response(err: &DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(fields) => {
            let trace_id = Uuid::now_v7();
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "title": "validation_failure",
                    "detail": err.to_string(),
                    "status": 400,
                    "trace_id": trace_id.to_string(),
                    "errors": fields,
                })),
            )
                .into_response()
        }
        DomainError::InvariantViolation(_) => {
            problem(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", err.to_string())
        }
        DomainError::InvalidId(_) => problem(StatusCode::BAD_REQUEST, "invalid_id", err.to_string()),
        DomainError::NotFound => problem(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

pub fn not_found(detail: impl Into<String>) -> axum::response::Response {
    problem(StatusCode::NOT_FOUND, "not_found", detail)
}

pub fn internal(detail: impl Into<String>) -> axum::response::Response {
    problem(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", detail)
}
