use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;

use modushop_catalog::{
    Product, ProductStoreError, UpdateProductPrice, UpdateProductPriceError,
    UpdateProductPriceHandler,
};
use modushop_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/price", put(update_price))
}

#[derive(Debug, Deserialize)]
struct ListProductsQuery {
    category: Option<String>,
}

async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let product = match Product::new(
        body.name,
        body.categories,
        body.description,
        body.image_file,
        body.price,
    ) {
        Ok(product) => product,
        Err(e) => return errors::domain_error_response(&e),
    };

    if let Err(e) = services.product_store.insert(&product).await {
        return errors::internal(e.to_string());
    }
    (
        StatusCode::CREATED,
        Json(dto::ProductResponse::from(&product)),
    )
        .into_response()
}

async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListProductsQuery>,
) -> axum::response::Response {
    let listed = match query.category.as_deref() {
        Some(category) => services.product_store.list_by_category(category).await,
        None => services.product_store.list().await,
    };
    match listed {
        Ok(products) => Json(
            products
                .iter()
                .map(dto::ProductResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::internal(e.to_string()),
    }
}

async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ProductId>,
) -> axum::response::Response {
    match services.product_store.get(id).await {
        Ok(Some(product)) => Json(dto::ProductResponse::from(&product)).into_response(),
        Ok(None) => errors::not_found(format!("product {id} not found")),
        Err(e) => errors::internal(e.to_string()),
    }
}

async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ProductId>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> axum::response::Response {
    let existing = match services.product_store.get(id).await {
        Ok(Some(product)) => product,
        Ok(None) => return errors::not_found(format!("product {id} not found")),
        Err(e) => return errors::internal(e.to_string()),
    };

    let updated = Product {
        id,
        name: body.name,
        categories: body.categories,
        description: body.description,
        image_file: body.image_file,
        price: existing.price,
    };
    if let Err(e) = updated.validate() {
        return errors::domain_error_response(&e);
    }

    match services.product_store.update_details(&updated).await {
        Ok(()) => Json(dto::ProductResponse::from(&updated)).into_response(),
        Err(ProductStoreError::NotFound(id)) => {
            errors::not_found(format!("product {id} not found"))
        }
        Err(e) => errors::internal(e.to_string()),
    }
}

async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ProductId>,
) -> axum::response::Response {
    match services.product_store.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(ProductStoreError::NotFound(id)) => {
            errors::not_found(format!("product {id} not found"))
        }
        Err(e) => errors::internal(e.to_string()),
    }
}

async fn update_price(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ProductId>,
    Json(body): Json<dto::UpdatePriceRequest>,
) -> axum::response::Response {
    let handler = UpdateProductPriceHandler::new(services.product_store.clone());
    match handler
        .handle(UpdateProductPrice {
            product_id: id,
            price: body.price,
        })
        .await
    {
        Ok(product) => Json(dto::ProductResponse::from(&product)).into_response(),
        Err(UpdateProductPriceError::NotFound(id)) => {
            errors::not_found(format!("product {id} not found"))
        }
        Err(UpdateProductPriceError::Validation(e)) => errors::domain_error_response(&e),
        Err(UpdateProductPriceError::Store(e)) => errors::internal(e.to_string()),
    }
}
