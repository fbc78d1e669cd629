use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use crate::error::AppError;
use crate::api::AppState;

/// Decoded claims of a verified bearer token.
pub type Claims = Map<String, Value>;

/// Axum extractor that validates a Bearer JWT token.
/// Add this as a handler parameter to require authentication.
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::AuthFailed)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::AuthFailed)?;

        let claims = crate::auth::jwt::verify::<Claims>(token, &state.jwt_secret, state.jwt_algorithm)
            .map_err(|e| {
                tracing::debug!("Rejected bearer token: {}", e);
                AppError::AuthFailed
            })?;

        Ok(AuthUser(claims))
    }
}
