use axum::{routing::get, Router};
use std::sync::Arc;
use super::AppState;
use super::handlers;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Liveness probe (public)
        .route("/health", get(handlers::health::health_check))
}
