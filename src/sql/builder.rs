//! Builds parameterized SELECT, INSERT, UPDATE, upsert and DELETE statements from a record shape.
//! Identifiers come from the table registry and `Record::COLUMNS`; values are always `$n` parameters.

use crate::record::Record;
use crate::sql::SqlValue;

/// Quote identifier for PostgreSQL. Quoting also preserves case, so `"Id"` stays `Id`.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: SqlValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn select_column_list<T: Record>() -> String {
    T::COLUMNS.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
}

/// SELECT every shape column, unfiltered and unordered.
pub fn select_all<T: Record>(schema: &str, table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT {} FROM {}", select_column_list::<T>(), qualified_table(schema, table));
    q
}

/// SELECT by key. LIMIT 2 so a duplicated key is detectable without reading the whole table.
pub fn select_by_key<T: Record>(schema: &str, table: &str, key: SqlValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(key);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${} LIMIT 2",
        select_column_list::<T>(),
        qualified_table(schema, table),
        quoted(T::KEY),
        n
    );
    q
}

/// SELECT where one column equals a value. `column` must already be checked against the shape.
pub fn select_by_column<T: Record>(schema: &str, table: &str, column: &str, value: SqlValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(value);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        select_column_list::<T>(),
        qualified_table(schema, table),
        quoted(column),
        n
    );
    q
}

pub fn count_by_key<T: Record>(schema: &str, table: &str, key: SqlValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(key);
    q.sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ${}",
        qualified_table(schema, table),
        quoted(T::KEY),
        n
    );
    q
}

/// INSERT of every column, key included. `values` is aligned with `T::COLUMNS`.
pub fn insert<T: Record>(schema: &str, table: &str, values: Vec<SqlValue>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(T::COLUMNS.len());
    let mut placeholders = Vec::with_capacity(T::COLUMNS.len());
    for (col, val) in T::COLUMNS.iter().zip(values) {
        let n = q.push_param(val);
        cols.push(quoted(col));
        placeholders.push(format!("${}", n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table(schema, table),
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// UPDATE every non-key column by key. None when the shape has no column besides the key.
pub fn update<T: Record>(schema: &str, table: &str, values: Vec<SqlValue>, key: SqlValue) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (col, val) in T::COLUMNS.iter().zip(values) {
        if *col == T::KEY {
            continue;
        }
        let n = q.push_param(val);
        sets.push(format!("{} = ${}", quoted(col), n));
    }
    if sets.is_empty() {
        return None;
    }
    let key_param = q.push_param(key);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        qualified_table(schema, table),
        sets.join(", "),
        quoted(T::KEY),
        key_param
    );
    Some(q)
}

/// Single-statement upsert. Returns one boolean column `inserted`: `xmax` is 0 only for a
/// freshly inserted tuple.
pub fn upsert<T: Record>(schema: &str, table: &str, values: Vec<SqlValue>) -> QueryBuf {
    let mut q = insert::<T>(schema, table, values);
    let key = quoted(T::KEY);
    let sets: Vec<String> = T::COLUMNS
        .iter()
        .filter(|c| **c != T::KEY)
        .map(|c| {
            let c = quoted(c);
            format!("{} = EXCLUDED.{}", c, c)
        })
        .collect();
    // A key-only shape still needs a DO UPDATE so RETURNING yields a row on conflict.
    let set_clause = if sets.is_empty() {
        format!("{} = EXCLUDED.{}", key, key)
    } else {
        sets.join(", ")
    };
    q.sql = format!(
        "{} ON CONFLICT ({}) DO UPDATE SET {} RETURNING (xmax = 0) AS inserted",
        q.sql, key, set_clause
    );
    q
}

pub fn delete<T: Record>(schema: &str, table: &str, key: SqlValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(key);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}",
        qualified_table(schema, table),
        quoted(T::KEY),
        n
    );
    q
}
