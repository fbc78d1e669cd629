use sqlx::any::AnyRow;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use std::ops::{Deref, DerefMut};
use uuid::Uuid;
use crate::error::DbResult;

/// A unit of work bound to one pooled connection with an open transaction.
///
/// Writes become durable only through [`Session::commit`]. Dropping the session
/// any other way (early return, error, panic, or a cancelled future) rolls the
/// transaction back and hands the connection back to the pool.
///
/// The session dereferences to the underlying connection, so any sqlx query can
/// run against it:
///
/// ```ignore
/// sqlx::query("INSERT INTO users (name) VALUES (?)")
///     .bind("alice")
///     .execute(&mut *session)
///     .await?;
/// ```
pub struct Session {
    id: Uuid,
    tx: Transaction<'static, Any>,
}

impl Session {
    pub(crate) async fn begin(pool: &AnyPool) -> DbResult<Self> {
        let tx = pool.begin().await?;
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "Session opened");
        Ok(Self { id, tx })
    }

    /// Unique per session; two live sessions never share an id or a connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        tracing::debug!(session = %self.id, "Session committed");
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        tracing::debug!(session = %self.id, "Session rolled back");
        Ok(())
    }

    /// Run a statement, returning the number of affected rows.
    pub async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        let result = sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_all(&mut self, sql: &str) -> DbResult<Vec<AnyRow>> {
        Ok(sqlx::query(sql).fetch_all(&mut *self.tx).await?)
    }

    pub async fn fetch_one(&mut self, sql: &str) -> DbResult<AnyRow> {
        Ok(sqlx::query(sql).fetch_one(&mut *self.tx).await?)
    }

    pub async fn fetch_optional(&mut self, sql: &str) -> DbResult<Option<AnyRow>> {
        Ok(sqlx::query(sql).fetch_optional(&mut *self.tx).await?)
    }
}

impl Deref for Session {
    type Target = AnyConnection;

    fn deref(&self) -> &AnyConnection {
        &self.tx
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut AnyConnection {
        &mut self.tx
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}
