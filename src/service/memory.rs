//! In-process record store with the same contract as `PgStore`, for tests and local runs
//! without a database.

use crate::error::{Operation, StoreError};
use crate::record::{check_column, check_key, record_values, validate_shape, Record, UpsertOutcome};
use crate::sql::SqlValue;
use crate::store::RecordStore;
use crate::tables::TableRegistry;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct Entry {
    key: SqlValue,
    record: Box<dyn Any + Send + Sync>,
}

/// Rows are kept per table in insertion order; a table holds a single record type.
#[derive(Default)]
pub struct MemoryStore {
    tables: TableRegistry,
    rows: RwLock<HashMap<String, Vec<Entry>>>,
}

impl MemoryStore {
    pub fn new(tables: TableRegistry) -> Self {
        MemoryStore {
            tables,
            rows: RwLock::new(HashMap::new()),
        }
    }

    fn guard<T: Record>(&self, table: &str, operation: Operation) -> Result<(), StoreError> {
        self.tables
            .check(table)
            .and_then(|_| validate_shape::<T>())
            .inspect_err(|e| tracing::error!(table, %operation, error = %e, "rejected store call"))
    }
}

fn shape_mismatch(table: &str, operation: Operation) -> StoreError {
    tracing::error!(table, %operation, "table holds records of a different shape");
    StoreError::ShapeMismatch {
        table: table.to_string(),
    }
}

fn downcast<T: Record>(table: &str, operation: Operation, entry: &Entry) -> Result<T, StoreError> {
    entry
        .record
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| shape_mismatch(table, operation))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_all<T: Record>(&self, table: &str) -> Result<Vec<T>, StoreError> {
        self.guard::<T>(table, Operation::FetchAll)?;
        let rows = self.rows.read().await;
        let out = rows
            .get(table)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| downcast::<T>(table, Operation::FetchAll, e))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        tracing::debug!(table, count = out.len(), "retrieved records");
        Ok(out)
    }

    async fn fetch_by_id<T: Record>(&self, table: &str, id: &T::Key) -> Result<Option<T>, StoreError> {
        self.guard::<T>(table, Operation::FetchById)?;
        let key: SqlValue = id.clone().into();
        let rows = self.rows.read().await;
        let mut matches = rows.get(table).into_iter().flatten().filter(|e| e.key.sql_eq(&key));
        let first = matches.next();
        if matches.next().is_some() {
            tracing::error!(table, operation = %Operation::FetchById, key = %key, "duplicate key");
            return Err(StoreError::AmbiguousKey {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        first.map(|e| downcast::<T>(table, Operation::FetchById, e)).transpose()
    }

    async fn fetch_by_column<T, V>(&self, table: &str, column: &str, value: V) -> Result<Vec<T>, StoreError>
    where
        T: Record,
        V: Into<SqlValue> + Send,
    {
        self.guard::<T>(table, Operation::FetchByColumn)?;
        let idx = check_column::<T>(table, column)
            .inspect_err(|e| tracing::error!(table, column, error = %e, "rejected store call"))?;
        let value: SqlValue = value.into();
        let rows = self.rows.read().await;
        let mut out = Vec::new();
        for entry in rows.get(table).into_iter().flatten() {
            let record = downcast::<T>(table, Operation::FetchByColumn, entry)?;
            if record.values().get(idx).is_some_and(|v| v.sql_eq(&value)) {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn upsert<T: Record>(&self, table: &str, record: &T, id: &T::Key) -> Result<UpsertOutcome, StoreError> {
        self.guard::<T>(table, Operation::Upsert)?;
        check_key(table, record, id).inspect_err(|e| tracing::error!(table, error = %e, "rejected store call"))?;
        record_values(record).inspect_err(|e| tracing::error!(table, error = %e, "rejected store call"))?;
        let key: SqlValue = id.clone().into();
        let mut rows = self.rows.write().await;
        let entries = rows.entry(table.to_string()).or_default();
        if entries.first().is_some_and(|e| !e.record.is::<T>()) {
            return Err(shape_mismatch(table, Operation::Upsert));
        }
        let entry = Entry {
            key: key.clone(),
            record: Box::new(record.clone()),
        };
        match entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => {
                *existing = entry;
                tracing::debug!(table, key = %key, "updated record");
                Ok(UpsertOutcome::Updated)
            }
            None => {
                entries.push(entry);
                tracing::debug!(table, key = %key, "inserted new record");
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn delete<T: Record>(&self, table: &str, id: &T::Key) -> Result<bool, StoreError> {
        self.guard::<T>(table, Operation::Delete)?;
        let key: SqlValue = id.clone().into();
        let mut rows = self.rows.write().await;
        let Some(entries) = rows.get_mut(table) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|e| !e.key.sql_eq(&key));
        Ok(entries.len() < before)
    }

    fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn ensure_database_exists(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
