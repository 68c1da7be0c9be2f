//! Health and readiness routes for hosts that embed a store.

use crate::state::AppState;
use crate::store::RecordStore;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    database: &'static str,
}

#[derive(Serialize)]
struct VersionBody {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct InfoBody {
    #[serde(flatten)]
    build: VersionBody,
    tables: Vec<String>,
}

fn build() -> VersionBody {
    VersionBody {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    }
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<VersionBody> {
    Json(build())
}

/// 200 when the store answers a ping, 503 otherwise.
async fn ready<S: RecordStore + 'static>(State(state): State<AppState<S>>) -> (StatusCode, Json<ReadyBody>) {
    if state.store.ping().await {
        let body = ReadyBody {
            status: "ok",
            database: "ok",
        };
        (StatusCode::OK, Json(body))
    } else {
        let body = ReadyBody {
            status: "degraded",
            database: "unavailable",
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

async fn info<S: RecordStore + 'static>(State(state): State<AppState<S>>) -> Json<InfoBody> {
    Json(InfoBody {
        build: build(),
        tables: state.store.tables().iter().map(str::to_string).collect(),
    })
}

/// GET /health and GET /version. No state.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// `common_routes` plus GET /ready (store ping) and GET /info (build and registered tables).
pub fn common_routes_with_ready<S: RecordStore + 'static>(state: AppState<S>) -> Router {
    let stateful = Router::new()
        .route("/ready", get(ready::<S>))
        .route("/info", get(info::<S>))
        .with_state(state);
    common_routes().merge(stateful)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreSettings;
    use crate::service::{MemoryStore, PgStore};
    use crate::tables::TableRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_is_ok_without_state() {
        let (status, body) = get_json(common_routes(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn version_reports_crate_name() {
        let (_, body) = get_json(common_routes(), "/version").await;
        assert_eq!(body["name"], "siglat-store");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn info_lists_registered_tables() {
        let tables = TableRegistry::new(["Identity", "Alerts"]).unwrap();
        let app = common_routes_with_ready(AppState::new(Arc::new(MemoryStore::new(tables))));
        let (status, body) = get_json(app, "/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "siglat-store");
        assert_eq!(body["tables"], serde_json::json!(["Alerts", "Identity"]));
    }

    #[tokio::test]
    async fn info_needs_a_store() {
        let resp = common_routes()
            .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ready_is_ok_when_store_answers() {
        let app = common_routes_with_ready(AppState::new(Arc::new(MemoryStore::default())));
        let (status, body) = get_json(app, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn ready_degrades_when_database_unreachable() {
        let settings = StoreSettings::from_lookup(|k| {
            (k == "DATABASE_URL").then(|| "postgres://u:p@127.0.0.1:1/siglat".to_string())
        })
        .unwrap();
        let app = common_routes_with_ready(AppState::new(Arc::new(PgStore::new(settings))));
        let (status, body) = get_json(app, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, serde_json::json!({ "status": "degraded", "database": "unavailable" }));
    }
}
