use crate::{auth::AuthenticatedUser, error::ApiError, error::ApiResult, state::AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use ns_generator::{GeneratedManifestSet, ResourceRef};
use ns_orchestrator::{
    CreateNamespaceRequest, CreateOutcome, DeleteNamespaceRequest, DeleteOutcome,
    NamespaceRecord, NamespaceStatus, UpdateNamespaceRequest, UpdateOutcome, WorkflowHandle,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/namespaces",
            get(list_namespaces).post(create_namespace),
        )
        .route(
            "/api/v1/namespaces/{name}",
            get(get_namespace)
                .patch(update_namespace)
                .delete(delete_namespace),
        )
        .route("/api/v1/namespaces/{name}/manifests", get(get_manifests))
        .route("/api/v1/namespaces/{name}/status", get(get_status))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DryRunResponse {
    pub dry_run: bool,
    pub manifests: GeneratedManifestSet,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateAcceptedResponse {
    pub namespace: NamespaceRecord,
    pub workflow: WorkflowHandle,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDryRunResponse {
    pub dry_run: bool,
    pub resources: Vec<ResourceRef>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteAcceptedResponse {
    pub workflow: WorkflowHandle,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Kubernetes equality selector, e.g. `team=payments,env!=prod`
    pub label_selector: Option<String>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

#[utoipa::path(
    post,
    path = "/api/v1/namespaces",
    request_body = CreateNamespaceRequest,
    responses(
        (status = 200, description = "Dry run: manifests that would be applied", body = DryRunResponse),
        (status = 202, description = "Create workflow dispatched", body = CreateAcceptedResponse),
        (status = 400, description = "Request failed validation"),
        (status = 409, description = "Namespace already exists"),
        (status = 502, description = "Workflow engine refused or unreachable")
    ),
    tag = "ns-api"
)]
pub async fn create_namespace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateNamespaceRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = body(payload)?;

    let response = match state.service.create(request, &user.username).await? {
        CreateOutcome::DryRun(manifests) => (
            StatusCode::OK,
            Json(DryRunResponse {
                dry_run: true,
                manifests,
            }),
        )
            .into_response(),
        CreateOutcome::Accepted {
            namespace,
            workflow,
        } => (
            StatusCode::ACCEPTED,
            Json(CreateAcceptedResponse {
                namespace,
                workflow,
            }),
        )
            .into_response(),
    };

    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/v1/namespaces",
    params(ListQuery),
    responses(
        (status = 200, description = "Managed namespaces", body = Vec<NamespaceRecord>),
        (status = 400, description = "Malformed label selector")
    ),
    tag = "ns-api"
)]
pub async fn list_namespaces(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<NamespaceRecord>>> {
    let records = state.service.list(query.label_selector.as_deref()).await?;

    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{name}",
    params(("name" = String, Path, description = "Namespace name")),
    responses(
        (status = 200, description = "Namespace record", body = NamespaceRecord),
        (status = 404, description = "Namespace not found")
    ),
    tag = "ns-api"
)]
pub async fn get_namespace(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<NamespaceRecord>> {
    let record = state.service.get(&name).await?;

    Ok(Json(record))
}

#[utoipa::path(
    patch,
    path = "/api/v1/namespaces/{name}",
    params(("name" = String, Path, description = "Namespace name")),
    request_body = UpdateNamespaceRequest,
    responses(
        (status = 202, description = "Update workflow dispatched", body = UpdateOutcome),
        (status = 400, description = "Request failed validation"),
        (status = 404, description = "Namespace not found")
    ),
    tag = "ns-api"
)]
pub async fn update_namespace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(name): Path<String>,
    payload: Result<Json<UpdateNamespaceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UpdateOutcome>)> {
    let request = body(payload)?;
    let outcome = state.service.update(&name, request, &user.username).await?;

    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/namespaces/{name}",
    params(("name" = String, Path, description = "Namespace name"), DeleteNamespaceRequest),
    responses(
        (status = 200, description = "Dry run: resources that would be removed", body = DeleteDryRunResponse),
        (status = 202, description = "Delete workflow dispatched", body = DeleteAcceptedResponse),
        (status = 404, description = "Namespace not found")
    ),
    tag = "ns-api"
)]
pub async fn delete_namespace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(name): Path<String>,
    Query(request): Query<DeleteNamespaceRequest>,
) -> ApiResult<Response> {
    let response = match state.service.delete(&name, request, &user.username).await? {
        DeleteOutcome::DryRun { resources } => (
            StatusCode::OK,
            Json(DeleteDryRunResponse {
                dry_run: true,
                resources,
            }),
        )
            .into_response(),
        DeleteOutcome::Accepted { workflow } => (
            StatusCode::ACCEPTED,
            Json(DeleteAcceptedResponse { workflow }),
        )
            .into_response(),
    };

    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{name}/manifests",
    params(("name" = String, Path, description = "Namespace name")),
    responses(
        (status = 200, description = "Manifests regenerated from the namespace record", body = GeneratedManifestSet),
        (status = 404, description = "Namespace not found")
    ),
    tag = "ns-api"
)]
pub async fn get_manifests(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<GeneratedManifestSet>> {
    let manifests = state.service.manifests(&name).await?;

    Ok(Json(manifests))
}

#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{name}/status",
    params(("name" = String, Path, description = "Namespace name")),
    responses(
        (status = 200, description = "Health summary and latest workflow", body = NamespaceStatus),
        (status = 404, description = "Namespace unknown to the cluster and the ledger")
    ),
    tag = "ns-api"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<NamespaceStatus>> {
    let status = state.service.status(&name).await?;

    Ok(Json(status))
}
