//! Generic record persistence against PostgreSQL.

use crate::config::{StoreSettings, UpsertStrategy};
use crate::error::{Operation, StoreError};
use crate::record::{check_column, check_key, record_values, validate_shape, Record, UpsertOutcome};
use crate::sql::{self, QueryBuf, SqlValue};
use crate::store::{ensure_database_exists, RecordStore};
use crate::tables::TableRegistry;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, PgPool, Postgres, Row};
use tokio::sync::OnceCell;

/// Record store over a lazily connected `PgPool`.
///
/// Every call checks out its own connection; the pool is the only shared resource.
/// Construct inside a tokio runtime (the pool spawns its maintenance task).
pub struct PgStore {
    pool: PgPool,
    settings: StoreSettings,
    initialized: OnceCell<()>,
}

impl PgStore {
    /// No I/O happens here; connections open on first use.
    pub fn new(settings: StoreSettings) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_lazy_with(settings.connect_options());
        Self::with_pool(pool, settings)
    }

    pub fn with_pool(pool: PgPool, settings: StoreSettings) -> Self {
        PgStore {
            pool,
            settings,
            initialized: OnceCell::new(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Run database bootstrap once. Concurrent callers wait on the same run; a failed run
    /// leaves the store uninitialized so the next call retries.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.initialized
            .get_or_try_init(|| async {
                ensure_database_exists(&self.settings).await?;
                tracing::info!(target_db = %self.settings.target(), "database initialization completed");
                Ok::<(), StoreError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    fn schema(&self) -> &str {
        &self.settings.schema
    }

    /// Registry and shape checks shared by every typed operation.
    fn guard<T: Record>(&self, table: &str, operation: Operation) -> Result<(), StoreError> {
        self.settings
            .tables
            .check(table)
            .and_then(|_| validate_shape::<T>())
            .inspect_err(|e| tracing::error!(table, %operation, error = %e, "rejected store call"))
    }

    async fn fetch_rows<T: Record>(&self, q: QueryBuf) -> Result<Vec<T>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_as::<_, T>(&q.sql);
        for p in q.params {
            query = query.bind(p);
        }
        query.fetch_all(&self.pool).await
    }
}

fn bind_all<'q>(mut query: Query<'q, Postgres, PgArguments>, params: Vec<SqlValue>) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = query.bind(p);
    }
    query
}

fn fail(table: &str, operation: Operation, key: &SqlValue, source: sqlx::Error) -> StoreError {
    tracing::error!(table, %operation, key = %key, error = %source, "store operation failed");
    StoreError::from_sqlx(table, operation, source)
}

#[async_trait]
impl RecordStore for PgStore {
    async fn fetch_all<T: Record>(&self, table: &str) -> Result<Vec<T>, StoreError> {
        self.guard::<T>(table, Operation::FetchAll)?;
        let q = sql::select_all::<T>(self.schema(), table);
        let rows = self.fetch_rows::<T>(q).await.map_err(|e| {
            tracing::error!(table, operation = %Operation::FetchAll, error = %e, "store operation failed");
            StoreError::from_sqlx(table, Operation::FetchAll, e)
        })?;
        tracing::info!(table, count = rows.len(), "retrieved records");
        Ok(rows)
    }

    async fn fetch_by_id<T: Record>(&self, table: &str, id: &T::Key) -> Result<Option<T>, StoreError> {
        self.guard::<T>(table, Operation::FetchById)?;
        let key: SqlValue = id.clone().into();
        let q = sql::select_by_key::<T>(self.schema(), table, key.clone());
        let mut rows = self
            .fetch_rows::<T>(q)
            .await
            .map_err(|e| fail(table, Operation::FetchById, &key, e))?;
        match rows.len() {
            0 => {
                tracing::info!(table, key = %key, "no record found");
                Ok(None)
            }
            1 => {
                tracing::info!(table, key = %key, "retrieved record");
                Ok(rows.pop())
            }
            _ => {
                tracing::error!(table, key = %key, "duplicate key");
                Err(StoreError::AmbiguousKey {
                    table: table.to_string(),
                    key: key.to_string(),
                })
            }
        }
    }

    async fn fetch_by_column<T, V>(&self, table: &str, column: &str, value: V) -> Result<Vec<T>, StoreError>
    where
        T: Record,
        V: Into<SqlValue> + Send,
    {
        self.guard::<T>(table, Operation::FetchByColumn)?;
        check_column::<T>(table, column)
            .inspect_err(|e| tracing::error!(table, column, error = %e, "rejected store call"))?;
        let value: SqlValue = value.into();
        let q = sql::select_by_column::<T>(self.schema(), table, column, value.clone());
        let rows = self.fetch_rows::<T>(q).await.map_err(|e| {
            tracing::error!(table, column, value = %value, error = %e, "store operation failed");
            StoreError::from_sqlx(table, Operation::FetchByColumn, e)
        })?;
        tracing::info!(table, column, value = %value, count = rows.len(), "retrieved records");
        Ok(rows)
    }

    async fn upsert<T: Record>(&self, table: &str, record: &T, id: &T::Key) -> Result<UpsertOutcome, StoreError> {
        self.guard::<T>(table, Operation::Upsert)?;
        check_key(table, record, id).inspect_err(|e| tracing::error!(table, error = %e, "rejected store call"))?;
        let values = record_values(record)?;
        let key: SqlValue = id.clone().into();
        let op = Operation::Upsert;

        let outcome = match self.settings.upsert {
            UpsertStrategy::Atomic => {
                let q = sql::upsert::<T>(self.schema(), table, values);
                tracing::debug!(sql = %q.sql, params = ?q.params, "query");
                let row = bind_all(sqlx::query(&q.sql), q.params)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| fail(table, op, &key, e))?;
                let inserted: bool = row.try_get("inserted").map_err(|e| fail(table, op, &key, e))?;
                if inserted {
                    UpsertOutcome::Inserted
                } else {
                    UpsertOutcome::Updated
                }
            }
            UpsertStrategy::CheckThenWrite => {
                let mut conn = self.pool.acquire().await.map_err(|e| fail(table, op, &key, e))?;
                let c = sql::count_by_key::<T>(self.schema(), table, key.clone());
                tracing::debug!(sql = %c.sql, params = ?c.params, "query");
                let mut count_query = sqlx::query_scalar::<_, i64>(&c.sql);
                for p in c.params {
                    count_query = count_query.bind(p);
                }
                let count = count_query
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(|e| fail(table, op, &key, e))?;

                if count > 0 {
                    match sql::update::<T>(self.schema(), table, values, key.clone()) {
                        Some(q) => {
                            tracing::debug!(sql = %q.sql, params = ?q.params, "query");
                            let done = bind_all(sqlx::query(&q.sql), q.params)
                                .execute(&mut *conn)
                                .await
                                .map_err(|e| fail(table, op, &key, e))?;
                            if done.rows_affected() > 0 {
                                UpsertOutcome::Updated
                            } else {
                                UpsertOutcome::Missed
                            }
                        }
                        // Key-only shape: the row is already in its final state.
                        None => UpsertOutcome::Updated,
                    }
                } else {
                    let q = sql::insert::<T>(self.schema(), table, values);
                    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
                    bind_all(sqlx::query(&q.sql), q.params)
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| fail(table, op, &key, e))?;
                    UpsertOutcome::Inserted
                }
            }
        };

        match outcome {
            UpsertOutcome::Inserted => tracing::info!(table, key = %key, "inserted new record"),
            UpsertOutcome::Updated => tracing::info!(table, key = %key, "updated record"),
            UpsertOutcome::Missed => tracing::warn!(table, key = %key, "record vanished before update"),
        }
        Ok(outcome)
    }

    async fn delete<T: Record>(&self, table: &str, id: &T::Key) -> Result<bool, StoreError> {
        self.guard::<T>(table, Operation::Delete)?;
        let key: SqlValue = id.clone().into();
        let q = sql::delete::<T>(self.schema(), table, key.clone());
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(sqlx::query(&q.sql), q.params)
            .execute(&self.pool)
            .await
            .map_err(|e| fail(table, Operation::Delete, &key, e))?;
        if done.rows_affected() > 0 {
            tracing::info!(table, key = %key, "deleted record");
            Ok(true)
        } else {
            tracing::info!(table, key = %key, "no record found to delete");
            Ok(false)
        }
    }

    fn tables(&self) -> &TableRegistry {
        &self.settings.tables
    }

    /// Opens a dedicated connection (bypassing the pool) so the probe reflects the server now.
    async fn ping(&self) -> bool {
        match self.settings.connect_options().connect().await {
            Ok(mut conn) => {
                let result = conn.ping().await;
                if let Err(e) = conn.close().await {
                    tracing::debug!(error = %e, "closing ping connection failed");
                }
                match result {
                    Ok(()) => {
                        tracing::info!(target_db = %self.settings.target(), "PostgreSQL connection successful");
                        true
                    }
                    Err(e) => {
                        tracing::error!(target_db = %self.settings.target(), operation = %Operation::Ping, error = %e, "PostgreSQL ping failed");
                        false
                    }
                }
            }
            Err(e) => {
                tracing::error!(target_db = %self.settings.target(), operation = %Operation::Ping, error = %e, "PostgreSQL connection failed");
                false
            }
        }
    }

    async fn ensure_database_exists(&self) -> Result<(), StoreError> {
        ensure_database_exists(&self.settings).await
    }
}
