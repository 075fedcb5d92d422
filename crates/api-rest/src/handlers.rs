use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use rms_core::Mapping;
use rms_types::BranchPath;

use api_shared::auth::{validate_api_key, API_KEY_HEADER};
use api_shared::{
    ApiError, BatchReconcileReq, BatchReconcileRes, ErrorRes, HealthRes, HealthService, MergeReq,
    MergeRes, PlanRes, ReconcileReq, ReconcileRes, UpdatingRes,
};

use crate::{AppState, RestError};

/// Default commit comment for merges requested without one.
const DEFAULT_MERGE_COMMENT: &str = "Merged by RMS";

fn authorise(state: &AppState, headers: &HeaderMap) -> Result<(), RestError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    validate_api_key(provided, state.api_key.as_deref())?;
    Ok(())
}

fn branch(value: String, field: &str) -> Result<BranchPath, RestError> {
    BranchPath::new(value)
        .map_err(|e| RestError(ApiError::BadRequest(format!("invalid {field} branch: {e}"))))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Does not call the terminology server.
#[axum::debug_handler]
pub(crate) async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/mappings/plan",
    request_body = ReconcileReq,
    responses(
        (status = 200, description = "Planned operations", body = PlanRes),
        (status = 400, description = "Invalid map set or mapping", body = ErrorRes),
        (status = 502, description = "Terminology server error", body = ErrorRes)
    )
)]
/// Plan a reconciliation without applying it
///
/// Reads the remote mapping and reports which members would be created, deleted, inactivated,
/// reactivated or updated.
pub(crate) async fn plan_mapping(
    State(state): State<AppState>,
    Json(req): Json<ReconcileReq>,
) -> Result<Json<PlanRes>, RestError> {
    let map_set = req.map_set.into_map_set(state.cfg.module_id().as_str())?;
    let plan = state.service.plan(&map_set, Mapping::from(req.mapping)).await?;
    Ok(Json(PlanRes::from(&plan)))
}

#[utoipa::path(
    put,
    path = "/mappings",
    request_body = ReconcileReq,
    params(("x-api-key" = Option<String>, Header, description = "API key, when one is configured")),
    responses(
        (status = 200, description = "Mapping as stored after reconciliation", body = ReconcileRes),
        (status = 400, description = "Invalid map set or mapping", body = ErrorRes),
        (status = 401, description = "Missing or invalid API key", body = ErrorRes),
        (status = 502, description = "Terminology server error", body = ErrorRes)
    )
)]
/// Reconcile one mapping
///
/// Brings the remote map members of the source code in line with the submitted mapping and
/// returns the mapping as now stored, member ids included.
pub(crate) async fn reconcile_mapping(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReconcileReq>,
) -> Result<Json<ReconcileRes>, RestError> {
    authorise(&state, &headers)?;
    let map_set = req.map_set.into_map_set(state.cfg.module_id().as_str())?;
    let outcome = state
        .service
        .reconcile(&map_set, Mapping::from(req.mapping))
        .await?;
    Ok(Json(ReconcileRes::from(&outcome)))
}

#[utoipa::path(
    post,
    path = "/mappings/batch",
    request_body = BatchReconcileReq,
    params(("x-api-key" = Option<String>, Header, description = "API key, when one is configured")),
    responses(
        (status = 200, description = "Per-code results", body = BatchReconcileRes),
        (status = 400, description = "Invalid map set", body = ErrorRes),
        (status = 401, description = "Missing or invalid API key", body = ErrorRes)
    )
)]
/// Reconcile several mappings of one map set
///
/// Each source code succeeds or fails on its own; failures are reported in the results.
pub(crate) async fn reconcile_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BatchReconcileReq>,
) -> Result<Json<BatchReconcileRes>, RestError> {
    authorise(&state, &headers)?;
    let map_set = req.map_set.into_map_set(state.cfg.module_id().as_str())?;
    let mappings = req.mappings.into_iter().map(Mapping::from).collect();
    let report = state.service.reconcile_batch(&map_set, mappings).await?;
    Ok(Json(BatchReconcileRes::from(&report)))
}

#[utoipa::path(
    get,
    path = "/mapsets/{refset}/updating",
    params(("refset" = String, Path, description = "Map reference set code")),
    responses(
        (status = 200, description = "Whether a reconciliation holds the map set", body = UpdatingRes)
    )
)]
/// Report whether a reconciliation is running for a map set
pub(crate) async fn map_set_updating(
    State(state): State<AppState>,
    Path(refset): Path<String>,
) -> Json<UpdatingRes> {
    let updating = state.service.is_updating(&refset);
    Json(UpdatingRes {
        refset_code: refset,
        updating,
    })
}

#[utoipa::path(
    post,
    path = "/branches/merge",
    request_body = MergeReq,
    params(("x-api-key" = Option<String>, Header, description = "API key, when one is configured")),
    responses(
        (status = 200, description = "Merge completed", body = MergeRes),
        (status = 400, description = "Invalid branch path", body = ErrorRes),
        (status = 401, description = "Missing or invalid API key", body = ErrorRes),
        (status = 502, description = "Merge failed, conflicted or timed out", body = ErrorRes)
    )
)]
/// Merge one branch into another and wait for the merge job
pub(crate) async fn merge_branches(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MergeReq>,
) -> Result<Json<MergeRes>, RestError> {
    authorise(&state, &headers)?;
    let source = branch(req.source, "source")?;
    let target = branch(req.target, "target")?;
    let comment = req
        .comment
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MERGE_COMMENT.to_string());

    tracing::info!(%source, %target, "merge requested");
    let status = state.service.merge(&source, &target, &comment).await?;
    Ok(Json(MergeRes {
        status: status.status,
        message: status.message,
    }))
}
