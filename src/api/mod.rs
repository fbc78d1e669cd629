use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::Router;
use jsonwebtoken::Algorithm;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use crate::config::Config;
use crate::db::SessionManager;
use crate::error::TokenError;

pub mod handlers;
pub mod middleware;
pub mod router;

pub struct AppState {
    pub service_name: String,
    pub db: Arc<SessionManager>,
    pub jwt_secret: String,
    pub jwt_expiry_minutes: i64,
    pub jwt_algorithm: Algorithm,
}

impl AppState {
    pub fn new(cfg: &Config, db: Arc<SessionManager>) -> Result<Self> {
        let jwt_algorithm = crate::auth::jwt::parse_algorithm(&cfg.auth.jwt_algorithm)?;
        Ok(Self {
            service_name: cfg.service.name.clone(),
            db,
            jwt_secret: cfg.auth.jwt_secret.clone(),
            jwt_expiry_minutes: cfg.auth.jwt_expiry_minutes,
            jwt_algorithm,
        })
    }

    /// Sign `claims` with the configured secret, algorithm and lifetime.
    pub fn issue_token<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        crate::auth::jwt::issue(
            claims,
            &self.jwt_secret,
            chrono::Duration::minutes(self.jwt_expiry_minutes),
            self.jwt_algorithm,
        )
    }
}

/// Run the service: initialize the database, serve `routes` alongside the shared
/// endpoints until ctrl-c or SIGTERM, then close the database.
pub async fn serve(cfg: Config, db: Arc<SessionManager>, routes: Router<Arc<AppState>>) -> Result<()> {
    db.initialize().await.context("database initialization failed")?;

    let bind_addr = format!("{}:{}", cfg.service.bind, cfg.service.port);
    let state = Arc::new(AppState::new(&cfg, db.clone())?);
    let cors = build_cors_layer(&cfg.api.cors_allowed_origins);
    let app = build_app(state, routes, cors);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("{} listening on http://{}", cfg.service.name, bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    db.close().await;
    tracing::info!("{} stopped", cfg.service.name);
    served?;
    Ok(())
}

/// Listed origins only, with credentials; methods and headers mirror the preflight.
pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured; CORS will block all cross-origin requests");
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Shared endpoints merged with the service's own `routes`, with a request-scoped
/// database session available to every handler.
pub fn build_app(state: Arc<AppState>, routes: Router<Arc<AppState>>, cors: CorsLayer) -> Router {
    let service = state.service_name.clone();
    let trace = TraceLayer::new_for_http().make_span_with(move |req: &Request<Body>| {
        tracing::info_span!("request", service = %service, method = %req.method(), uri = %req.uri())
    });

    router::routes()
        .merge(routes)
        .layer(axum::middleware::from_fn(middleware::session::request_session))
        .with_state(state)
        .layer(trace)
        .layer(cors)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
