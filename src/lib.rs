//! Shared building blocks for the service fleet: configuration, pooled database
//! sessions, credential helpers and axum scaffolding.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use config::{Config, DatabaseConfig};
pub use db::{BlockingSessionManager, HealthStatus, Session, SessionManager};
pub use error::{AppError, DbError, TokenError};
