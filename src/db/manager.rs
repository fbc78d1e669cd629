use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::config::DatabaseConfig;
use crate::db::engine::{Engine, Mode, PoolStatus};
use crate::db::session::Session;
use crate::error::{DbError, DbResult};

/// Outcome of a liveness probe against the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self { healthy: true, message: "healthy".to_string() }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self { healthy: false, message: message.into() }
    }
}

/// Owns the database engine and hands out transactional sessions.
///
/// Construct one per process and share it as `Arc<SessionManager>`. The engine is
/// built on first use (or by [`SessionManager::initialize`]) and torn down by
/// [`SessionManager::close`]; a closed manager rebuilds the engine from the same
/// configuration the next time a session is requested.
pub struct SessionManager {
    config: DatabaseConfig,
    mode: Mode,
    engine: RwLock<Option<Arc<Engine>>>,
}

impl SessionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self::with_mode(config, Mode::Async)
    }

    pub(crate) fn with_mode(config: DatabaseConfig, mode: Mode) -> Self {
        Self {
            config,
            mode,
            engine: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Build the engine if it does not exist yet. Later calls are no-ops.
    pub async fn initialize(&self) -> DbResult<()> {
        self.engine().await.map(|_| ())
    }

    pub async fn is_initialized(&self) -> bool {
        self.engine.read().await.is_some()
    }

    /// Current engine, building it under the write lock if absent so racing
    /// first users end up sharing a single pool.
    async fn engine(&self) -> DbResult<Arc<Engine>> {
        if let Some(engine) = self.engine.read().await.as_ref() {
            return Ok(engine.clone());
        }

        let mut slot = self.engine.write().await;
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }

        let engine = Arc::new(Engine::build(&self.config, self.mode)?);
        *slot = Some(engine.clone());
        Ok(engine)
    }

    /// Open a session on its own pooled connection, initializing the engine first
    /// if needed. Waits at most `pool_timeout` for a free connection.
    pub async fn acquire_session(&self) -> DbResult<Session> {
        let engine = self.engine().await?;
        Session::begin(engine.pool()).await
    }

    /// Run `f` inside a session: commit when it returns `Ok`, roll back and
    /// return its error otherwise. If the returned future is dropped before it
    /// completes, the session is dropped with it and rolls back.
    ///
    /// ```ignore
    /// let id: i64 = manager
    ///     .scope(|session| Box::pin(async move {
    ///         let row: (i64,) = sqlx::query_as("INSERT INTO notes (body) VALUES ('x') RETURNING id")
    ///             .fetch_one(&mut **session)
    ///             .await
    ///             .map_err(DbError::from)?;
    ///         Ok::<_, DbError>(row.0)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn scope<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
        E: From<DbError>,
    {
        let mut session = self.acquire_session().await?;
        match f(&mut session).await {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let id = session.id();
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(session = %id, "Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Dispose the engine. No-op when nothing is initialized.
    ///
    /// Waits for checked-out sessions to be released, so do not call it while
    /// holding a session on the same task.
    pub async fn close(&self) {
        let engine = self.engine.write().await.take();
        if let Some(engine) = engine {
            engine.dispose().await;
        }
    }

    /// Round-trip `SELECT 1`. Every failure, including a panic inside the driver,
    /// is reported as an unhealthy status rather than propagated.
    pub async fn health_check(&self) -> HealthStatus {
        match AssertUnwindSafe(self.ping()).catch_unwind().await {
            Ok(Ok(())) => HealthStatus::healthy(),
            Ok(Err(e)) => {
                tracing::warn!("Database health check failed: {}", e);
                HealthStatus::unhealthy(e.to_string())
            }
            Err(_) => {
                tracing::error!("Database health check panicked");
                HealthStatus::unhealthy("health check panicked")
            }
        }
    }

    async fn ping(&self) -> DbResult<()> {
        let mut session = self.acquire_session().await?;
        session.fetch_one("SELECT 1").await?;
        session.rollback().await
    }

    /// `None` when the engine has not been built.
    pub async fn pool_status(&self) -> Option<PoolStatus> {
        self.engine.read().await.as_ref().map(|engine| engine.status())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
