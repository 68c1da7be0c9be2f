//! Typed values that sqlx can bind, one variant per supported column type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};
use std::fmt;
use uuid::Uuid;

/// A nullable scalar bound to a PostgreSQL parameter.
///
/// Every variant carries an `Option` so a NULL still reports its column type to the
/// server (an untyped NULL cannot be inserted into a `uuid` or `timestamptz` column).
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Bool(Option<bool>),
    I32(Option<i32>),
    I64(Option<i64>),
    F64(Option<f64>),
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Timestamp(Option<DateTime<Utc>>),
    NaiveTimestamp(Option<NaiveDateTime>),
    Date(Option<NaiveDate>),
    Json(Option<Value>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Bool(v) => v.is_none(),
            SqlValue::I32(v) => v.is_none(),
            SqlValue::I64(v) => v.is_none(),
            SqlValue::F64(v) => v.is_none(),
            SqlValue::Text(v) => v.is_none(),
            SqlValue::Uuid(v) => v.is_none(),
            SqlValue::Timestamp(v) => v.is_none(),
            SqlValue::NaiveTimestamp(v) => v.is_none(),
            SqlValue::Date(v) => v.is_none(),
            SqlValue::Json(v) => v.is_none(),
        }
    }

    /// Equality as a `WHERE col = $1` comparison sees it: NULL equals nothing, and integer
    /// and float widths are widened before comparing.
    pub fn sql_eq(&self, other: &SqlValue) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
            return a == b;
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I32(v) => v.map(i64::from),
            SqlValue::I64(v) => *v,
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::F64(v) => *v,
            other => other.as_i64().map(|n| n as f64),
        }
    }

    fn pg_type(&self) -> PgTypeInfo {
        match self {
            SqlValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            SqlValue::I32(_) => <i32 as Type<Postgres>>::type_info(),
            SqlValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            SqlValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            SqlValue::Text(_) => <String as Type<Postgres>>::type_info(),
            SqlValue::Uuid(_) => <Uuid as Type<Postgres>>::type_info(),
            SqlValue::Timestamp(_) => <DateTime<Utc> as Type<Postgres>>::type_info(),
            SqlValue::NaiveTimestamp(_) => <NaiveDateTime as Type<Postgres>>::type_info(),
            SqlValue::Date(_) => <NaiveDate as Type<Postgres>>::type_info(),
            SqlValue::Json(_) => <Value as Type<Postgres>>::type_info(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(f: &mut fmt::Formatter<'_>, v: &Option<T>) -> fmt::Result {
            match v {
                Some(v) => write!(f, "{}", v),
                None => f.write_str("NULL"),
            }
        }
        match self {
            SqlValue::Bool(v) => show(f, v),
            SqlValue::I32(v) => show(f, v),
            SqlValue::I64(v) => show(f, v),
            SqlValue::F64(v) => show(f, v),
            SqlValue::Text(v) => show(f, v),
            SqlValue::Uuid(v) => show(f, v),
            SqlValue::Timestamp(v) => show(f, &v.map(|d| d.to_rfc3339())),
            SqlValue::NaiveTimestamp(v) => show(f, v),
            SqlValue::Date(v) => show(f, v),
            SqlValue::Json(v) => show(f, v),
        }
    }
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(Some(v))
                }
            }

            impl From<Option<$ty>> for SqlValue {
                fn from(v: Option<$ty>) -> Self {
                    SqlValue::$variant(v)
                }
            }
        )*
    };
}

sql_value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f64 => F64,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDateTime => NaiveTimestamp,
    NaiveDate => Date,
    Value => Json,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(Some(v.to_string()))
    }
}

impl From<Option<&str>> for SqlValue {
    fn from(v: Option<&str>) -> Self {
        SqlValue::Text(v.map(str::to_string))
    }
}

impl<'q> Encode<'q, Postgres> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            SqlValue::Bool(v) => <Option<bool> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::I32(v) => <Option<i32> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::I64(v) => <Option<i64> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::F64(v) => <Option<f64> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::Text(v) => <Option<String> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::Uuid(v) => <Option<Uuid> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::Timestamp(v) => <Option<DateTime<Utc>> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::NaiveTimestamp(v) => <Option<NaiveDateTime> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::Date(v) => <Option<NaiveDate> as Encode<Postgres>>::encode_by_ref(v, buf),
            SqlValue::Json(v) => <Option<Value> as Encode<Postgres>>::encode_by_ref(v, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.pg_type())
    }
}

impl Type<Postgres> for SqlValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
