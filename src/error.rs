use thiserror::Error;

/// Failures surfaced by the session manager.
#[derive(Debug, Error)]
pub enum DbError {
    /// Missing or invalid connection settings. Fatal, raised at initialization.
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// No pooled connection became available within `pool_timeout`.
    #[error("Timed out waiting for a pooled database connection")]
    PoolTimeout,

    /// Constraint violation or driver failure inside a unit of work.
    #[error("Transaction error: {0}")]
    Transaction(#[source] sqlx::Error),

    /// Network, TLS or authentication failure talking to the backend.
    #[error("Connectivity error: {0}")]
    Connectivity(#[source] sqlx::Error),
}

impl DbError {
    /// Pool exhaustion and connectivity failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::PoolTimeout | DbError::Connectivity(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DbError::PoolTimeout,
            sqlx::Error::Configuration(e) => DbError::Configuration(e.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Connectivity(err),
            sqlx::Error::Database(ref db) if is_connection_failure(db.as_ref()) => {
                DbError::Connectivity(err)
            }
            other => DbError::Transaction(other),
        }
    }
}

fn is_connection_failure(db: &dyn sqlx::error::DatabaseError) -> bool {
    let code = db.code();
    if db.try_downcast_ref::<sqlx::sqlite::SqliteError>().is_some() {
        is_sqlite_open_failure(code.as_deref())
    } else {
        is_connection_sqlstate(code.as_deref())
    }
}

/// SQLSTATE class 08 (connection exception) and 28 (invalid authorization).
fn is_connection_sqlstate(code: Option<&str>) -> bool {
    matches!(code, Some(c) if c.starts_with("08") || c.starts_with("28"))
}

/// SQLITE_CANTOPEN (14) and SQLITE_NOTADB (26), including their extended codes.
fn is_sqlite_open_failure(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, 14 | 26))
        .unwrap_or(false)
}

pub type DbResult<T> = Result<T, DbError>;

/// Failures while issuing or verifying a signed token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Token encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;
        use serde_json::json;

        let (status, message) = match &self {
            AppError::AuthFailed => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Database(e) if e.is_retryable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable".to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_pool_timeout_is_classified() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolTimeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_io_error_is_connectivity() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: DbError = sqlx::Error::Io(io).into();
        assert!(matches!(err, DbError::Connectivity(_)));
    }

    #[test]
    fn test_row_not_found_is_transaction() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::Transaction(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connection_sqlstate_classes() {
        assert!(is_connection_sqlstate(Some("08006")));
        assert!(is_connection_sqlstate(Some("28P01")));
        assert!(!is_connection_sqlstate(Some("23505")));
        assert!(!is_connection_sqlstate(None));
    }

    #[test]
    fn test_sqlite_open_failures() {
        assert!(is_sqlite_open_failure(Some("14")));
        assert!(is_sqlite_open_failure(Some("782"))); // SQLITE_CANTOPEN_FULLPATH
        assert!(is_sqlite_open_failure(Some("26")));
        assert!(!is_sqlite_open_failure(Some("19")));
        assert!(!is_sqlite_open_failure(Some("2067"))); // SQLITE_CONSTRAINT_UNIQUE
        assert!(!is_sqlite_open_failure(None));
    }

    #[test]
    fn test_app_error_status_codes() {
        let resp = AppError::AuthFailed.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = AppError::Database(DbError::PoolTimeout).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = AppError::Database(DbError::Configuration("missing url".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
