//! Record shapes: the compile-time column map a type persists through the store.

use crate::config::is_valid_identifier;
use crate::error::StoreError;
use crate::sql::SqlValue;
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use std::collections::HashSet;

/// A type the store can persist.
///
/// `COLUMNS` lists every persisted column (key included) and `values` returns one value per
/// column in the same order. Rows are read back through `FromRow`, so column names must match
/// exactly; derive it with `#[sqlx(rename_all = "PascalCase")]` for the `Id`/`Role` style.
///
/// ```ignore
/// #[derive(Clone, Debug, sqlx::FromRow)]
/// #[sqlx(rename_all = "PascalCase")]
/// struct Identity { id: Uuid, role: String }
///
/// impl Record for Identity {
///     type Key = Uuid;
///     const COLUMNS: &'static [&'static str] = &["Id", "Role"];
///     fn key(&self) -> Uuid { self.id }
///     fn values(&self) -> Vec<SqlValue> { vec![self.id.into(), self.role.clone().into()] }
/// }
/// ```
pub trait Record: for<'r> FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static {
    type Key: Clone + PartialEq + Into<SqlValue> + Send + Sync;

    const KEY: &'static str = "Id";
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;

    fn values(&self) -> Vec<SqlValue>;
}

/// Check the static parts of a shape: key present, no duplicates, plain identifiers.
pub fn validate_shape<T: Record>() -> Result<(), StoreError> {
    if !is_valid_identifier(T::KEY) {
        return Err(StoreError::InvalidShape(format!("key column '{}' is not an identifier", T::KEY)));
    }
    if !T::COLUMNS.contains(&T::KEY) {
        return Err(StoreError::InvalidShape(format!(
            "columns {:?} do not include key column '{}'",
            T::COLUMNS,
            T::KEY
        )));
    }
    let mut seen = HashSet::new();
    for col in T::COLUMNS {
        if !is_valid_identifier(col) {
            return Err(StoreError::InvalidShape(format!("column '{}' is not an identifier", col)));
        }
        if !seen.insert(*col) {
            return Err(StoreError::InvalidShape(format!("column '{}' is listed twice", col)));
        }
    }
    Ok(())
}

/// Values of `record`, checked against the column list.
pub fn record_values<T: Record>(record: &T) -> Result<Vec<SqlValue>, StoreError> {
    let values = record.values();
    if values.len() != T::COLUMNS.len() {
        return Err(StoreError::InvalidShape(format!(
            "{} values for {} columns",
            values.len(),
            T::COLUMNS.len()
        )));
    }
    Ok(values)
}

/// Reject a column that is not part of `T`'s shape. Case-sensitive.
pub fn check_column<T: Record>(table: &str, column: &str) -> Result<usize, StoreError> {
    T::COLUMNS
        .iter()
        .position(|c| *c == column)
        .ok_or_else(|| StoreError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

/// The supplied id must be the record's own key.
pub fn check_key<T: Record>(table: &str, record: &T, id: &T::Key) -> Result<(), StoreError> {
    let own = record.key();
    if own == *id {
        Ok(())
    } else {
        Err(StoreError::KeyMismatch {
            table: table.to_string(),
            record: Into::<SqlValue>::into(own).to_string(),
            supplied: Into::<SqlValue>::into(id.clone()).to_string(),
        })
    }
}

/// Result of an upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Check-then-write only: the row existed at the check but the update touched nothing.
    Missed,
}

impl UpsertOutcome {
    pub fn applied(self) -> bool {
        !matches!(self, UpsertOutcome::Missed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, FromRow)]
    #[sqlx(rename_all = "PascalCase")]
    struct Contact {
        id: Uuid,
        label: String,
        phone: Option<String>,
    }

    impl Record for Contact {
        type Key = Uuid;
        const COLUMNS: &'static [&'static str] = &["Id", "Label", "Phone"];

        fn key(&self) -> Uuid {
            self.id
        }

        fn values(&self) -> Vec<SqlValue> {
            vec![self.id.into(), self.label.clone().into(), self.phone.clone().into()]
        }
    }

    #[derive(Clone, Debug, FromRow)]
    struct Keyless {
        name: String,
    }

    impl Record for Keyless {
        type Key = String;
        const COLUMNS: &'static [&'static str] = &["name"];

        fn key(&self) -> String {
            self.name.clone()
        }

        fn values(&self) -> Vec<SqlValue> {
            vec![self.name.clone().into()]
        }
    }

    #[derive(Clone, Debug, FromRow)]
    struct Doubled {
        id: i64,
    }

    impl Record for Doubled {
        type Key = i64;
        const KEY: &'static str = "id";
        const COLUMNS: &'static [&'static str] = &["id", "id"];

        fn key(&self) -> i64 {
            self.id
        }

        fn values(&self) -> Vec<SqlValue> {
            vec![self.id.into(), self.id.into()]
        }
    }

    fn contact() -> Contact {
        Contact {
            id: Uuid::new_v4(),
            label: "Barangay hall".into(),
            phone: None,
        }
    }

    #[test]
    fn valid_shape_passes() {
        assert!(validate_shape::<Contact>().is_ok());
        assert_eq!(record_values(&contact()).unwrap().len(), 3);
    }

    #[test]
    fn shape_without_key_is_rejected() {
        let err = validate_shape::<Keyless>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidShape(m) if m.contains("'Id'")));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = validate_shape::<Doubled>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidShape(m) if m.contains("twice")));
    }

    #[test]
    fn column_check_is_exact() {
        assert_eq!(check_column::<Contact>("Contact", "Phone").unwrap(), 2);
        assert!(matches!(
            check_column::<Contact>("Contact", "phone"),
            Err(StoreError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn key_mismatch_reports_both_ids() {
        let c = contact();
        let other = Uuid::new_v4();
        assert!(check_key("Contact", &c, &c.id).is_ok());
        let err = check_key("Contact", &c, &other).unwrap_err();
        match err {
            StoreError::KeyMismatch { record, supplied, .. } => {
                assert_eq!(record, c.id.to_string());
                assert_eq!(supplied, other.to_string());
            }
            e => panic!("unexpected {e:?}"),
        }
    }

    #[test]
    fn only_missed_is_not_applied() {
        assert!(UpsertOutcome::Inserted.applied());
        assert!(UpsertOutcome::Updated.applied());
        assert!(!UpsertOutcome::Missed.applied());
    }
}
