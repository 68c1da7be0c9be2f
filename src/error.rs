//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable '{0}' is not set or is empty")]
    MissingVar(&'static str),
    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),
}

/// Store operation named in errors and log fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    FetchAll,
    FetchById,
    FetchByColumn,
    Upsert,
    Delete,
    Ping,
    EnsureDatabase,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::FetchAll => "fetch_all",
            Operation::FetchById => "fetch_by_id",
            Operation::FetchByColumn => "fetch_by_column",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
            Operation::Ping => "ping",
            Operation::EnsureDatabase => "ensure_database",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{operation} on '{target}': connection failed: {source}")]
    Connection {
        target: String,
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },
    #[error("{operation} on table '{table}' failed: {source}")]
    Execution {
        table: String,
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },
    #[error("table '{0}' is not registered")]
    UnknownTable(String),
    #[error("column '{column}' is not part of the record shape for table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("invalid record shape: {0}")]
    InvalidShape(String),
    #[error("key mismatch on table '{table}': record key {record} differs from id {supplied}")]
    KeyMismatch {
        table: String,
        record: String,
        supplied: String,
    },
    #[error("table '{table}' has more than one row with key {key}")]
    AmbiguousKey { table: String, key: String },
    #[error("table '{table}' holds records of a different shape")]
    ShapeMismatch { table: String },
}

impl StoreError {
    /// Wrap a driver error, separating unreachable/unauthenticated backends from failed statements.
    pub fn from_sqlx(table: &str, operation: Operation, source: sqlx::Error) -> Self {
        if is_connection_error(&source) {
            StoreError::Connection {
                target: table.to_string(),
                operation,
                source,
            }
        } else {
            StoreError::Execution {
                table: table.to_string(),
                operation,
                source,
            }
        }
    }
}

/// SQLSTATE classes 08 (connection exception) and 28 (invalid authorization), plus 3D000 (unknown database).
fn is_connection_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|c| c.starts_with("08") || c.starts_with("28") || c == "3D000")
            .unwrap_or(false),
        _ => false,
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        // Driver text can carry SQL and values; it stays in the logs.
        let (status, code, message) = match &self {
            StoreError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "store is misconfigured".to_string(),
            ),
            StoreError::Connection { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "database_unavailable",
                "database is unavailable".to_string(),
            ),
            StoreError::Execution { table, operation, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                format!("{} on '{}' failed", operation, table),
            ),
            StoreError::UnknownTable(_)
            | StoreError::UnknownColumn { .. }
            | StoreError::InvalidShape(_)
            | StoreError::KeyMismatch { .. } => (StatusCode::BAD_REQUEST, "bad_request", self.to_string()),
            StoreError::AmbiguousKey { .. } | StoreError::ShapeMismatch { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "data_integrity",
                self.to_string(),
            ),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn pool_timeout_is_a_connection_error() {
        let err = StoreError::from_sqlx("Identity", Operation::FetchAll, sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Connection { operation: Operation::FetchAll, .. }));
    }

    #[test]
    fn row_not_found_is_an_execution_error() {
        let err = StoreError::from_sqlx("Identity", Operation::Delete, sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Execution { ref table, .. } if table == "Identity"));
        assert!(err.to_string().starts_with("delete on table 'Identity' failed"));
    }

    #[tokio::test]
    async fn execution_errors_are_redacted() {
        let err = StoreError::Execution {
            table: "Alerts".into(),
            operation: Operation::Upsert,
            source: sqlx::Error::Protocol("SELECT secret FROM x".into()),
        };
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "database_error");
        assert_eq!(body["error"]["message"], "upsert on 'Alerts' failed");
        assert!(!body.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn unknown_column_maps_to_bad_request() {
        let err = StoreError::UnknownColumn {
            table: "Identity".into(),
            column: "role".into(),
        };
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn connection_errors_map_to_service_unavailable() {
        let err = StoreError::from_sqlx("Chat", Operation::FetchById, sqlx::Error::PoolClosed);
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
