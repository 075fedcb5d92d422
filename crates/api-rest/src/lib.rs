//! # API REST
//!
//! REST API for RMS.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, CORS, the `x-api-key` header)
//!
//! Uses `api-shared` for request/response bodies and error mapping. The binary that serves this
//! router is `rms-run` at the workspace root.

#![warn(rust_2018_idioms)]

mod handlers;

#[cfg(test)]
mod memory_store;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use rms_core::{CoreConfig, MappingService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{ApiError, ErrorRes};

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub service: MappingService,
    /// Expected `x-api-key`; `None` disables authentication.
    pub api_key: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::plan_mapping,
        handlers::reconcile_mapping,
        handlers::reconcile_batch,
        handlers::map_set_updating,
        handlers::merge_branches,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::MapEntryDto,
        api_shared::MappingDto,
        api_shared::MapSetDto,
        api_shared::ReconcileReq,
        api_shared::BatchReconcileReq,
        api_shared::MergeReq,
        api_shared::PlanSummaryDto,
        api_shared::PlanRes,
        api_shared::ReconcileRes,
        api_shared::BatchItemRes,
        api_shared::BatchReconcileRes,
        api_shared::UpdatingRes,
        api_shared::MergeRes,
        api_shared::ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/mappings", put(handlers::reconcile_mapping))
        .route("/mappings/plan", post(handlers::plan_mapping))
        .route("/mappings/batch", post(handlers::reconcile_batch))
        .route("/mapsets/:refset/updating", get(handlers::map_set_updating))
        .route("/branches/merge", post(handlers::merge_branches))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// [`ApiError`] rendered as a JSON `{ "error": ... }` response.
#[derive(Debug)]
pub struct RestError(pub ApiError);

impl From<ApiError> for RestError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<rms_core::MappingError> for RestError {
    fn from(err: rms_core::MappingError) -> Self {
        Self(ApiError::from(err))
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorRes {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use http_body_util::BodyExt;
    use rms_types::{BranchPath, NonEmptyText};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn app(store: Arc<MemoryStore>) -> Router {
        let cfg = Arc::new(
            CoreConfig::new(
                "http://snowstorm.test",
                BranchPath::new("MAIN/SNOMEDCT-NO").expect("valid"),
                NonEmptyText::new("51000202101").expect("valid"),
                NonEmptyText::new(rms_core::constants::INTERNATIONAL_MODULE_ID).expect("valid"),
            )
            .expect("valid config")
            .with_polling(Duration::from_millis(1), Some(Duration::from_secs(5))),
        );
        let service = MappingService::new(cfg.clone(), store, None);
        router(AppState {
            cfg,
            service,
            api_key: Some(KEY.into()),
        })
    }

    fn request(method: Method, uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("valid request")
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, body)
    }

    fn reconcile_body(entries: Value) -> Value {
        json!({
            "map_set": {
                "refset_code": "447562003",
                "to_terminology": "ICD10"
            },
            "mapping": {
                "code": "74400008",
                "entries": entries
            }
        })
    }

    #[tokio::test]
    async fn health_is_open() {
        let (status, body) = send(
            app(Arc::new(MemoryStore::default())),
            request(Method::GET, "/health", None, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn reconcile_requires_api_key() {
        let store = Arc::new(MemoryStore::default());
        let (status, body) = send(
            app(store.clone()),
            request(
                Method::PUT,
                "/mappings",
                Some("wrong"),
                reconcile_body(json!([{ "group": 1, "priority": 1, "to_code": "K35.8" }])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().is_some());
        assert!(store.members().is_empty());
    }

    #[tokio::test]
    async fn reconcile_creates_members_and_returns_them() {
        let store = Arc::new(MemoryStore::default());
        let (status, body) = send(
            app(store.clone()),
            request(
                Method::PUT,
                "/mappings",
                Some(KEY),
                reconcile_body(json!([
                    { "group": 1, "priority": 2, "to_code": "K35.3", "rule": "TRUE" },
                    { "group": 1, "priority": 1, "to_code": "K35.8", "rule": "TRUE" }
                ])),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["case"], "no_existing_entries");
        assert_eq!(body["summary"]["create"], 2);
        assert_eq!(body["noop"], false);
        let entries = body["mapping"]["entries"].as_array().expect("entries");
        assert_eq!(entries[0]["to_code"], "K35.8");
        assert!(entries.iter().all(|e| e["member_id"].is_string()));
        assert_eq!(store.members().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_slots_are_a_bad_request() {
        let (status, body) = send(
            app(Arc::new(MemoryStore::default())),
            request(
                Method::POST,
                "/mappings/plan",
                None,
                reconcile_body(json!([
                    { "group": 1, "priority": 1, "to_code": "K35.8" },
                    { "group": 1, "priority": 1, "to_code": "K35.3" }
                ])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .is_some_and(|e| e.contains("group 1 priority 1")));
    }

    #[tokio::test]
    async fn plan_lists_operations_without_mutating() {
        let store = Arc::new(MemoryStore::default());
        let (status, body) = send(
            app(store.clone()),
            request(
                Method::POST,
                "/mappings/plan",
                None,
                reconcile_body(json!([{ "group": 1, "priority": 1, "to_code": "K35.8" }])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["create"], 1);
        assert_eq!(body["create"][0]["module_id"], "51000202101");
        assert!(store.members().is_empty());
    }

    #[tokio::test]
    async fn remote_failure_is_a_bad_gateway() {
        let store = Arc::new(MemoryStore::default());
        store.fail_queries();
        let (status, _) = send(
            app(store),
            request(
                Method::PUT,
                "/mappings",
                Some(KEY),
                reconcile_body(json!([{ "group": 1, "priority": 1, "to_code": "K35.8" }])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn batch_reports_per_code_results() {
        let body = json!({
            "map_set": { "refset_code": "447562003" },
            "mappings": [
                { "code": "74400008", "entries": [{ "group": 1, "priority": 1, "to_code": "K35.8" }] },
                { "code": "", "entries": [] }
            ]
        });
        let (status, body) = send(
            app(Arc::new(MemoryStore::default())),
            request(Method::POST, "/mappings/batch", Some(KEY), body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["succeeded"], 1);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["results"][1]["ok"], false);
    }

    #[tokio::test]
    async fn updating_flag_is_false_when_idle() {
        let (status, body) = send(
            app(Arc::new(MemoryStore::default())),
            request(Method::GET, "/mapsets/447562003/updating", None, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "refset_code": "447562003", "updating": false }));
    }

    #[tokio::test]
    async fn merge_waits_for_completion() {
        let (status, body) = send(
            app(Arc::new(MemoryStore::default())),
            request(
                Method::POST,
                "/branches/merge",
                Some(KEY),
                json!({ "source": "MAIN/SNOMEDCT-NO/MAPS", "target": "MAIN/SNOMEDCT-NO" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "COMPLETED");
    }

    #[tokio::test]
    async fn blank_merge_branch_is_a_bad_request() {
        let (status, _) = send(
            app(Arc::new(MemoryStore::default())),
            request(
                Method::POST,
                "/branches/merge",
                Some(KEY),
                json!({ "source": "MAIN//MAPS", "target": "MAIN" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
