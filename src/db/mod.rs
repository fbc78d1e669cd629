//! Pooled database engine and transactional sessions.
//!
//! [`SessionManager`] is the async entry point and [`BlockingSessionManager`] the
//! blocking one. Both build a single lazily-connected pool from a
//! [`DatabaseConfig`](crate::config::DatabaseConfig) and hand out [`Session`]s that
//! commit explicitly and roll back when dropped.

pub mod blocking;
pub mod engine;
pub mod manager;
pub mod session;
pub mod url;

pub use blocking::{BlockingSession, BlockingSessionManager};
pub use engine::{Engine, Mode, PoolStatus};
pub use manager::{HealthStatus, SessionManager};
pub use session::Session;
pub use url::{Backend, DatabaseUrl};
