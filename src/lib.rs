//! SIGLAT store: generic record persistence over PostgreSQL.

pub mod config;
pub mod error;
pub mod record;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod tables;

pub use config::{StoreSettings, UpsertStrategy};
pub use error::{ConfigError, Operation, StoreError};
pub use record::{Record, UpsertOutcome};
pub use routes::{common_routes, common_routes_with_ready};
pub use service::{MemoryStore, PgStore};
pub use sql::SqlValue;
pub use state::AppState;
pub use store::{ensure_database_exists, RecordStore};
pub use tables::{TableRegistry, DEFAULT_TABLES};
