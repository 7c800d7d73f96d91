use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    extract::Extension,
    routing::{get, patch, post},
};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full application router.
///
/// Public routes (tender browsing, bid submission) require no identity; admin
/// routes require the opaque admin id forwarded by the auth collaborator.
pub async fn build_app() -> Router {
    let services = Arc::new(services::build_in_memory_services());

    let public = Router::new()
        .route("/tenders", get(routes::tenders::list_tenders))
        .route("/tenders/:id", get(routes::tenders::get_tender))
        .route("/tenders/:id/bids", post(routes::bids::submit_bid));

    let admin = Router::new()
        .route("/tenders", post(routes::tenders::create_tender))
        .route("/tenders/:id/close", post(routes::tenders::close_tender))
        .route("/tenders/:id/award", post(routes::tenders::award_tender))
        .route("/tenders/:id/bids", get(routes::bids::list_bids))
        .route("/bids/:id/status", patch(routes::bids::set_bid_status))
        .route("/bids/reject-all", post(routes::bids::reject_all))
        .route(
            "/products",
            post(routes::catalog::register_product).get(routes::catalog::list_products),
        )
        .route("/stores", get(routes::stores::list_stores))
        .layer(axum::middleware::from_fn(crate::middleware::admin_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(admin)
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}

async fn health() -> StatusCode {
    StatusCode::OK
}
