use log::LevelFilter;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use crate::config::DatabaseConfig;
use crate::db::url::{Backend, DatabaseUrl};
use crate::error::{DbError, DbResult};

/// Calling convention the engine was built for. Both drive the same async driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Async,
    Blocking,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Async => f.write_str("async"),
            Mode::Blocking => f.write_str("blocking"),
        }
    }
}

/// Point-in-time view of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Open connections, idle or checked out.
    pub size: u32,
    pub idle: usize,
}

/// Pooled connection factory for one database endpoint.
pub struct Engine {
    pool: AnyPool,
    url: DatabaseUrl,
    mode: Mode,
}

impl Engine {
    /// Build the pool without opening any connection. Must run inside a tokio runtime.
    pub fn build(config: &DatabaseConfig, mode: Mode) -> DbResult<Self> {
        sqlx::any::install_default_drivers();

        let url = DatabaseUrl::parse(config)?;
        let mut options = AnyConnectOptions::from_str(url.as_str())
            .map_err(|e| DbError::Configuration(e.to_string()))?;
        options = if config.echo {
            options.log_statements(LevelFilter::Info)
        } else {
            options.disable_statement_logging()
        };

        // pool_size steady connections plus max_overflow burst connections
        let max_connections = config.pool_size.saturating_add(config.max_overflow).max(1);

        let pool = AnyPoolOptions::new()
            .min_connections(0)
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(config.pool_timeout))
            .test_before_acquire(true)
            .connect_lazy_with(options);

        tracing::info!(
            mode = %mode,
            max_connections,
            secure_transport_injected = url.secure_transport_injected(),
            "DB → {}",
            url
        );

        Ok(Self { pool, url, mode })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn backend(&self) -> Backend {
        self.url.backend()
    }

    pub fn url(&self) -> &DatabaseUrl {
        &self.url
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// Close idle connections and wait for checked-out ones to come back.
    pub async fn dispose(&self) {
        self.pool.close().await;
        tracing::info!("Database engine disposed: {}", self.url);
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("url", &self.url)
            .field("mode", &self.mode)
            .field("status", &self.status())
            .finish()
    }
}
