pub mod health;
pub mod namespaces;
pub mod workflows;
pub mod ws;

use crate::{
    api_docs::ApiDoc,
    auth::{auth_middleware, webhook_auth_middleware},
    state::AppState,
};
use axum::{middleware, routing::get, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

pub fn create_app(state: AppState) -> Router {
    // Allow CORS for local development (frontend on different port)
    let cors = CorsLayer::permissive();

    Router::new()
        .merge(health::routes()) // Health routes don't need auth
        .merge(
            workflows::webhook_routes() // Called by the engine, not by users
                .layer(middleware::from_fn_with_state(state.clone(), webhook_auth_middleware)),
        )
        .route("/api-docs/openapi.json", get(openapi_spec))
        .merge(
            namespaces::routes()
                .merge(workflows::routes())
                .merge(ws::routes())
                .layer(middleware::from_fn(auth_middleware)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
