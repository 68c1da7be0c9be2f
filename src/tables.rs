//! Allow-list of table names a store will address.

use crate::config::validate_identifier;
use crate::error::{ConfigError, StoreError};
use std::collections::BTreeSet;

/// Tables of the dispatch backend's schema.
pub const DEFAULT_TABLES: &[&str] = &[
    "Identity",
    "Coordinates",
    "Verifications",
    "Alerts",
    "UserXYZ",
    "Contact",
    "Chat",
    "LoginLogs",
    "Reports",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRegistry {
    allowed: BTreeSet<String>,
}

impl TableRegistry {
    /// Build from names; every name must be a plain identifier. Matching is case-sensitive.
    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed = BTreeSet::new();
        for name in names {
            let name = name.into();
            validate_identifier(&name)?;
            allowed.insert(name);
        }
        Ok(TableRegistry { allowed })
    }

    pub fn contains(&self, table: &str) -> bool {
        self.allowed.contains(table)
    }

    /// Check a caller-supplied table name against the allow-list.
    pub fn check(&self, table: &str) -> Result<(), StoreError> {
        if self.contains(table) {
            Ok(())
        } else {
            Err(StoreError::UnknownTable(table.to_string()))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        TableRegistry {
            allowed: DEFAULT_TABLES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_holds_dispatch_tables() {
        let reg = TableRegistry::default();
        assert_eq!(reg.len(), DEFAULT_TABLES.len());
        assert!(reg.contains("Identity"));
        assert!(reg.contains("LoginLogs"));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let reg = TableRegistry::default();
        assert!(reg.check("Identity").is_ok());
        assert!(matches!(reg.check("identity"), Err(StoreError::UnknownTable(t)) if t == "identity"));
    }

    #[test]
    fn rejects_injected_names() {
        let err = TableRegistry::new(["Identity", "x\"; DROP TABLE y; --"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier(_)));
    }
}
