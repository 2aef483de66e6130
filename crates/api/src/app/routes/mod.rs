use axum::Router;

pub mod basket;
pub mod orders;
pub mod products;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .nest("/basket", basket::router())
        .nest("/orders", orders::router())
        .nest("/products", products::router())
        .nest("/outbox", system::outbox_router())
}
