//! Store settings resolved from the environment.

use crate::tables::TableRegistry;
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Administrative database used to create the target database.
pub const ADMIN_DATABASE: &str = "postgres";

/// How `upsert` reaches the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpsertStrategy {
    /// Single `INSERT ... ON CONFLICT (key) DO UPDATE`. Needs a unique constraint on the key.
    #[default]
    Atomic,
    /// `SELECT COUNT(*)` then `UPDATE` or `INSERT`, for tables without a unique key.
    /// Concurrent upserts of one new id can both insert.
    CheckThenWrite,
}

impl FromStr for UpsertStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atomic" => Ok(UpsertStrategy::Atomic),
            "check_then_write" => Ok(UpsertStrategy::CheckThenWrite),
            other => Err(ConfigError::InvalidValue {
                name: "DB_UPSERT_STRATEGY",
                reason: format!("'{}' (expected atomic or check_then_write)", other),
            }),
        }
    }
}

/// Connection and behaviour settings for a `PgStore`.
#[derive(Clone)]
pub struct StoreSettings {
    pub(crate) connection: PgConnectOptions,
    pub(crate) database: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub schema: String,
    pub max_connections: u32,
    pub upsert: UpsertStrategy,
    pub tables: TableRegistry,
}

impl StoreSettings {
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Options for the target database.
    pub fn connect_options(&self) -> PgConnectOptions {
        self.connection.clone()
    }

    /// Same server and credentials, pointed at the administrative database.
    pub fn admin_options(&self) -> PgConnectOptions {
        self.connection.clone().database(ADMIN_DATABASE)
    }

    /// `host:port/database`, for logs. Never includes credentials.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("target", &self.target())
            .field("schema", &self.schema)
            .field("max_connections", &self.max_connections)
            .field("upsert", &self.upsert)
            .field("tables", &self.tables.iter().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
