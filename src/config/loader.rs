//! Load `StoreSettings` from environment variables.
//!
//! `DATABASE_URL` wins when set; otherwise `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS`
//! and `DB_DB` are all required. Empty values count as unset.

use crate::config::types::{StoreSettings, UpsertStrategy, DEFAULT_MAX_CONNECTIONS, DEFAULT_SCHEMA};
use crate::config::validate_identifier;
use crate::error::ConfigError;
use crate::tables::TableRegistry;
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;

impl StoreSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let (connection, host, port, database) = match get("DATABASE_URL") {
            Some(url) => {
                let opts = PgConnectOptions::from_str(&url).map_err(|e| ConfigError::InvalidValue {
                    name: "DATABASE_URL",
                    reason: e.to_string(),
                })?;
                let database = opts
                    .get_database()
                    .map(str::to_string)
                    .ok_or(ConfigError::InvalidValue {
                        name: "DATABASE_URL",
                        reason: "no database name in path".into(),
                    })?;
                let host = opts.get_host().to_string();
                let port = opts.get_port();
                (opts, host, port, database)
            }
            None => {
                let host = get("DB_HOST").ok_or(ConfigError::MissingVar("DB_HOST"))?;
                let port_raw = get("DB_PORT").ok_or(ConfigError::MissingVar("DB_PORT"))?;
                let user = get("DB_USER").ok_or(ConfigError::MissingVar("DB_USER"))?;
                let pass = get("DB_PASS").ok_or(ConfigError::MissingVar("DB_PASS"))?;
                let database = get("DB_DB").ok_or(ConfigError::MissingVar("DB_DB"))?;
                let port: u16 = port_raw.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "DB_PORT",
                    reason: format!("'{}' is not a port number", port_raw),
                })?;
                let opts = PgConnectOptions::new()
                    .host(&host)
                    .port(port)
                    .username(&user)
                    .password(&pass)
                    .database(&database);
                (opts, host, port, database)
            }
        };

        let schema = get("DB_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        validate_identifier(&schema)?;

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "DB_MAX_CONNECTIONS",
                    reason: format!("'{}' is not a positive integer", raw),
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let upsert = match get("DB_UPSERT_STRATEGY") {
            Some(raw) => raw.parse()?,
            None => UpsertStrategy::default(),
        };

        let tables = match get("DB_TABLES") {
            Some(raw) => TableRegistry::new(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))?,
            None => TableRegistry::default(),
        };

        Ok(StoreSettings {
            connection,
            database,
            host,
            port,
            schema,
            max_connections,
            upsert,
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    const PARTS: &[(&str, &str)] = &[
        ("DB_HOST", "db.local"),
        ("DB_PORT", "5433"),
        ("DB_USER", "siglat"),
        ("DB_PASS", "hunter2"),
        ("DB_DB", "siglat"),
    ];

    #[test]
    fn builds_from_parts_with_defaults() {
        let s = StoreSettings::from_lookup(lookup(PARTS)).unwrap();
        assert_eq!(s.database(), "siglat");
        assert_eq!(s.target(), "db.local:5433/siglat");
        assert_eq!(s.schema, "public");
        assert_eq!(s.max_connections, 5);
        assert_eq!(s.upsert, UpsertStrategy::Atomic);
        assert_eq!(s.tables, TableRegistry::default());
        assert_eq!(s.admin_options().get_database(), Some("postgres"));
        assert_eq!(s.connect_options().get_database(), Some("siglat"));
    }

    #[test]
    fn missing_part_names_the_variable() {
        let partial: Vec<_> = PARTS.iter().copied().filter(|(k, _)| *k != "DB_PASS").collect();
        let err = StoreSettings::from_lookup(lookup(&partial)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DB_PASS")));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut pairs = PARTS.to_vec();
        pairs[0] = ("DB_HOST", "  ");
        let err = StoreSettings::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DB_HOST")));
    }

    #[test]
    fn bad_port_is_invalid_value() {
        let mut pairs = PARTS.to_vec();
        pairs[1] = ("DB_PORT", "five");
        let err = StoreSettings::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "DB_PORT", .. }));
    }

    #[test]
    fn database_url_overrides_parts() {
        let s = StoreSettings::from_lookup(lookup(&[("DATABASE_URL", "postgres://u:p@pg:6543/dispatch")])).unwrap();
        assert_eq!(s.database(), "dispatch");
        assert_eq!(s.target(), "pg:6543/dispatch");
    }

    #[test]
    fn overrides_are_applied() {
        let mut pairs = PARTS.to_vec();
        pairs.extend([
            ("DB_SCHEMA", "dispatch"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("DB_UPSERT_STRATEGY", "check_then_write"),
            ("DB_TABLES", "Identity, Alerts,"),
        ]);
        let s = StoreSettings::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(s.schema, "dispatch");
        assert_eq!(s.max_connections, 12);
        assert_eq!(s.upsert, UpsertStrategy::CheckThenWrite);
        assert_eq!(s.tables.iter().collect::<Vec<_>>(), vec!["Alerts", "Identity"]);
    }

    #[test]
    fn rejects_unknown_strategy_and_bad_schema() {
        let mut pairs = PARTS.to_vec();
        pairs.push(("DB_UPSERT_STRATEGY", "merge"));
        assert!(matches!(
            StoreSettings::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidValue { name: "DB_UPSERT_STRATEGY", .. })
        ));

        let mut pairs = PARTS.to_vec();
        pairs.push(("DB_SCHEMA", "public; --"));
        assert!(matches!(
            StoreSettings::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn debug_hides_password() {
        let s = StoreSettings::from_lookup(lookup(PARTS)).unwrap();
        let shown = format!("{:?}", s);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("db.local:5433/siglat"));
    }
}
