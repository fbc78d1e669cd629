use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;
use crate::api::AppState;

/// 200 `healthy` or 503 `unhealthy: <reason>`, plain text.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    let status = state.db.health_check().await;
    if status.healthy {
        (StatusCode::OK, "healthy".to_string())
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {}", status.message))
    }
}
