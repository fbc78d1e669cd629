use futures::future::BoxFuture;
use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use tokio::runtime::Runtime;
use uuid::Uuid;
use crate::config::DatabaseConfig;
use crate::db::engine::{Mode, PoolStatus};
use crate::db::manager::{HealthStatus, SessionManager};
use crate::db::session::Session;
use crate::error::{DbError, DbResult};

/// Blocking counterpart of [`SessionManager`] for code without an async runtime.
///
/// Owns a small private tokio runtime and drives every operation to completion on
/// the calling thread. Calling any method from inside an async runtime panics.
/// Dropping it there does not panic, but skips the graceful pool close.
pub struct BlockingSessionManager {
    inner: SessionManager,
    // Taken only by `drop`.
    runtime: Option<Runtime>,
}

impl BlockingSessionManager {
    pub fn new(config: DatabaseConfig) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("db-blocking")
            .enable_all()
            .build()?;
        Ok(Self {
            inner: SessionManager::with_mode(config, Mode::Blocking),
            runtime: Some(runtime),
        })
    }

    fn runtime(&self) -> &Runtime {
        self.runtime.as_ref().expect("runtime is present until drop")
    }

    pub fn config(&self) -> &DatabaseConfig {
        self.inner.config()
    }

    pub fn initialize(&self) -> DbResult<()> {
        self.runtime().block_on(self.inner.initialize())
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime().block_on(self.inner.is_initialized())
    }

    pub fn acquire_session(&self) -> DbResult<BlockingSession<'_>> {
        let session = self.runtime().block_on(self.inner.acquire_session())?;
        Ok(BlockingSession {
            runtime: self.runtime(),
            session: Some(session),
        })
    }

    /// Run `f` inside a session: commit on `Ok`, roll back and return the error otherwise.
    /// A panic inside `f` drops the session, which also rolls back.
    pub fn scope<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut BlockingSession<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut session = self.acquire_session()?;
        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                Ok(value)
            }
            Err(err) => {
                let id = session.id();
                if let Err(rollback_err) = session.rollback() {
                    tracing::warn!(session = %id, "Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    pub fn close(&self) {
        self.runtime().block_on(self.inner.close())
    }

    pub fn health_check(&self) -> HealthStatus {
        self.runtime().block_on(self.inner.health_check())
    }

    pub fn pool_status(&self) -> Option<PoolStatus> {
        self.runtime().block_on(self.inner.pool_status())
    }
}

impl Drop for BlockingSessionManager {
    /// Closes the engine. Inside an async context blocking is not allowed, so the
    /// private runtime is shut down in the background and the pool goes with it.
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            tracing::warn!("BlockingSessionManager dropped inside an async runtime; skipping close");
            runtime.shutdown_background();
            return;
        }
        runtime.block_on(self.inner.close());
    }
}

/// Blocking view of a [`Session`]. Dropping it without [`BlockingSession::commit`]
/// rolls back.
pub struct BlockingSession<'m> {
    runtime: &'m Runtime,
    // Present until consumed by commit or rollback.
    session: Option<Session>,
}

impl BlockingSession<'_> {
    fn session(&mut self) -> &mut Session {
        self.session
            .as_mut()
            .expect("session is present until commit or rollback consumes it")
    }

    pub fn id(&self) -> Uuid {
        self.session.as_ref().map(Session::id).unwrap_or_default()
    }

    pub fn execute(&mut self, sql: &str) -> DbResult<u64> {
        let runtime = self.runtime;
        runtime.block_on(self.session().execute(sql))
    }

    pub fn fetch_all(&mut self, sql: &str) -> DbResult<Vec<AnyRow>> {
        let runtime = self.runtime;
        runtime.block_on(self.session().fetch_all(sql))
    }

    pub fn fetch_one(&mut self, sql: &str) -> DbResult<AnyRow> {
        let runtime = self.runtime;
        runtime.block_on(self.session().fetch_one(sql))
    }

    pub fn fetch_optional(&mut self, sql: &str) -> DbResult<Option<AnyRow>> {
        let runtime = self.runtime;
        runtime.block_on(self.session().fetch_optional(sql))
    }

    /// Drive an arbitrary async operation against the session's connection.
    pub fn run<R>(&mut self, f: impl for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, R>) -> R {
        let runtime = self.runtime;
        let conn: &mut AnyConnection = self.session();
        runtime.block_on(f(conn))
    }

    pub fn commit(mut self) -> DbResult<()> {
        match self.session.take() {
            Some(session) => self.runtime.block_on(session.commit()),
            None => Ok(()),
        }
    }

    pub fn rollback(mut self) -> DbResult<()> {
        match self.session.take() {
            Some(session) => self.runtime.block_on(session.rollback()),
            None => Ok(()),
        }
    }
}

impl Drop for BlockingSession<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            // Returning the connection spawns a task, which needs a runtime context.
            let _guard = self.runtime.enter();
            drop(session);
        }
    }
}
