use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::state::AppState;

/// Requester identity set by the upstream identity proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
}

/// Headers checked for the caller, in order.
pub const USER_HEADERS: [&str; 3] = ["x-ns-user", "x-forwarded-user", "x-user"];

/// Extract the requester from proxy headers, rejecting anonymous calls.
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let username = USER_HEADERS
        .iter()
        .find_map(|name| req.headers().get(*name))
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(AuthenticatedUser { username });

    Ok(next.run(req).await)
}

/// Admit engine callbacks carrying the configured bearer token.
pub async fn webhook_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.webhook_token.as_deref() else {
        warn!("Rejecting engine event: no webhook token configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    if presented != Some(expected) {
        warn!("Rejecting engine event with missing or wrong token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
