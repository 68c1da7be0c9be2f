//! The record store contract and database bootstrap.

use crate::config::{StoreSettings, ADMIN_DATABASE};
use crate::error::{Operation, StoreError};
use crate::record::{Record, UpsertOutcome};
use crate::sql::{quoted, SqlValue};
use crate::tables::TableRegistry;
use async_trait::async_trait;
use sqlx::{ConnectOptions, Connection};

/// Table-agnostic persistence for any `Record` shape.
///
/// Zero matching rows is a normal outcome (`None` or an empty `Vec`), never an error.
/// Table names must be registered with the store; column names must belong to the shape.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every row of `table`, unordered.
    async fn fetch_all<T: Record>(&self, table: &str) -> Result<Vec<T>, StoreError>;

    /// The row whose key equals `id`. More than one match is `StoreError::AmbiguousKey`.
    async fn fetch_by_id<T: Record>(&self, table: &str, id: &T::Key) -> Result<Option<T>, StoreError>;

    /// Rows where `column` equals `value` exactly.
    async fn fetch_by_column<T, V>(&self, table: &str, column: &str, value: V) -> Result<Vec<T>, StoreError>
    where
        T: Record,
        V: Into<SqlValue> + Send;

    /// Insert `record` or overwrite every non-key column of the existing row. `id` must be the record's key.
    async fn upsert<T: Record>(&self, table: &str, record: &T, id: &T::Key) -> Result<UpsertOutcome, StoreError>;

    /// Remove the row keyed by `id`. False when nothing matched.
    async fn delete<T: Record>(&self, table: &str, id: &T::Key) -> Result<bool, StoreError>;

    /// Tables this store accepts.
    fn tables(&self) -> &TableRegistry;

    /// Liveness probe. Never errors.
    async fn ping(&self) -> bool;

    /// Create the target database when absent. Idempotent.
    async fn ensure_database_exists(&self) -> Result<(), StoreError>;
}

/// SQLSTATE duplicate_database: another process created it between our check and CREATE.
const DUPLICATE_DATABASE: &str = "42P04";

/// Ensure the database named in `settings` exists; create it if not. Connects to the
/// `postgres` administrative database to run CREATE DATABASE. Call before using the main pool.
pub async fn ensure_database_exists(settings: &StoreSettings) -> Result<(), StoreError> {
    let db_name = settings.database();
    if db_name.is_empty() || db_name == ADMIN_DATABASE {
        return Ok(());
    }
    let target = settings.target();
    let fail = |e: sqlx::Error| {
        tracing::error!(target_db = %target, error = %e, "database bootstrap failed");
        StoreError::from_sqlx(&target, Operation::EnsureDatabase, e)
    };

    let mut conn = settings.admin_options().connect().await.map_err(|e| {
        tracing::error!(target_db = %target, error = %e, "cannot reach administrative database");
        StoreError::Connection {
            target: target.clone(),
            operation: Operation::EnsureDatabase,
            source: e,
        }
    })?;

    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(fail)?;

    if exists.0 {
        tracing::info!(database = db_name, "database already exists");
    } else {
        tracing::info!(database = db_name, "database does not exist, creating");
        match sqlx::query(&format!("CREATE DATABASE {}", quoted(db_name)))
            .execute(&mut conn)
            .await
        {
            Ok(_) => tracing::info!(database = db_name, "database created"),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(DUPLICATE_DATABASE) => {
                tracing::info!(database = db_name, "database created concurrently");
            }
            Err(e) => return Err(fail(e)),
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "closing administrative connection failed");
    }
    Ok(())
}
