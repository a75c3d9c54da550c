use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ns_orchestrator::{
    EngineEvent, WorkflowFilters, WorkflowId, WorkflowKind, WorkflowPhase, WorkflowStatus,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/workflows", get(list_workflows))
        .route("/api/v1/workflows/{id}", get(get_workflow))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/v1/workflows/{id}/events", post(post_event))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkflowsQuery {
    pub namespace: Option<String>,
    /// create, update or delete
    pub kind: Option<String>,
    /// Pending, Running, Succeeded or Failed (case-insensitive)
    pub phase: Option<String>,
}

/// Progress report posted by the workflow engine.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EngineEventPayload {
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn parse_id(id: &str) -> ApiResult<WorkflowId> {
    WorkflowId::parse_str(id)
        .map_err(|_| ApiError::Validation(format!("Invalid workflow id: {}", id)))
}

fn parse_kind(kind: &str) -> ApiResult<WorkflowKind> {
    match kind.to_lowercase().as_str() {
        "create" => Ok(WorkflowKind::Create),
        "update" => Ok(WorkflowKind::Update),
        "delete" => Ok(WorkflowKind::Delete),
        _ => Err(ApiError::Validation(format!("Unknown workflow kind: {}", kind))),
    }
}

fn parse_phase(phase: &str) -> ApiResult<WorkflowPhase> {
    match phase.to_lowercase().as_str() {
        "pending" => Ok(WorkflowPhase::Pending),
        "running" => Ok(WorkflowPhase::Running),
        "succeeded" => Ok(WorkflowPhase::Succeeded),
        "failed" => Ok(WorkflowPhase::Failed),
        _ => Err(ApiError::Validation(format!("Unknown workflow phase: {}", phase))),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/workflows",
    params(WorkflowsQuery),
    responses(
        (status = 200, description = "Workflows, newest first", body = Vec<WorkflowStatus>),
        (status = 400, description = "Unknown kind or phase")
    ),
    tag = "ns-api"
)]
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<WorkflowsQuery>,
) -> ApiResult<Json<Vec<WorkflowStatus>>> {
    let filters = WorkflowFilters {
        namespace: query.namespace,
        kind: query.kind.as_deref().map(parse_kind).transpose()?,
        phase: query.phase.as_deref().map(parse_phase).transpose()?,
    };

    let workflows = state.ledger().list(filters).await?;

    Ok(Json(workflows))
}

#[utoipa::path(
    get,
    path = "/api/v1/workflows/{id}",
    params(("id" = String, Path, description = "Workflow id")),
    responses(
        (status = 200, description = "Last-known workflow status", body = WorkflowStatus),
        (status = 404, description = "Workflow not found")
    ),
    tag = "ns-api"
)]
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkflowStatus>> {
    let status = state.ledger().get(parse_id(&id)?).await?;

    Ok(Json(status))
}

#[utoipa::path(
    post,
    path = "/api/v1/workflows/{id}/events",
    params(("id" = String, Path, description = "Workflow id")),
    request_body = EngineEventPayload,
    responses(
        (status = 202, description = "Event queued for delivery"),
        (status = 400, description = "Malformed event"),
        (status = 401, description = "Missing or wrong engine bearer token"),
        (status = 503, description = "Event pump stopped")
    ),
    tag = "ns-api"
)]
pub async fn post_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<EngineEventPayload>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let workflow_id = parse_id(&id)?;
    let Json(payload) = payload.map_err(|r| ApiError::Validation(r.body_text()))?;

    let event = EngineEvent {
        workflow_id,
        phase: payload.phase,
        message: payload.message.unwrap_or_default(),
        timestamp: payload.timestamp.unwrap_or_else(Utc::now),
    };
    debug!(%workflow_id, phase = ?event.phase, "Engine event received");

    if !state.events.publish(event).await {
        return Err(ApiError::Unavailable("Event pump is not running".to_string()));
    }

    Ok(StatusCode::ACCEPTED)
}
