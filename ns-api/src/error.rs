use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ns_orchestrator::OrchestratorError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// The engine refused or could not be reached; nothing was dispatched
    #[error("{0}")]
    Dispatch(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotFound(_) => "not_found",
            ApiError::Dispatch(_) => "dispatch",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string(), "kind": self.kind() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(e) => ApiError::Validation(e.to_string()),
            OrchestratorError::InvalidInput(msg) => ApiError::Validation(msg),
            OrchestratorError::AlreadyExists(_) | OrchestratorError::MissingLimitRange { .. } => {
                ApiError::Conflict(err.to_string())
            }
            OrchestratorError::NotFound(_) | OrchestratorError::WorkflowNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            OrchestratorError::Dispatch(_) => ApiError::Dispatch(err.to_string()),
            OrchestratorError::Registry(_) => ApiError::Unavailable(err.to_string()),
            other => {
                error!(error = %other, "Request failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_core::ValidationError;
    use ns_orchestrator::{EngineError, RegistryError};

    #[test]
    fn test_taxonomy_mapping() {
        let cases = [
            (
                OrchestratorError::Validation(ValidationError::DescriptionTooLong { len: 300, max: 255 }),
                StatusCode::BAD_REQUEST,
                "validation",
            ),
            (
                OrchestratorError::AlreadyExists("team-a".to_string()),
                StatusCode::CONFLICT,
                "conflict",
            ),
            (
                OrchestratorError::NotFound("team-a".to_string()),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                OrchestratorError::Dispatch(EngineError::Rejected("bad template".to_string())),
                StatusCode::BAD_GATEWAY,
                "dispatch",
            ),
            (
                OrchestratorError::Registry(RegistryError::Unavailable("refused".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
            ),
            (
                OrchestratorError::InvalidState("corrupt".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];

        for (err, status, kind) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status(), status);
            assert_eq!(api.kind(), kind);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let api: ApiError = OrchestratorError::InvalidState("row 17 corrupt".to_string()).into();
        assert!(!api.to_string().contains("row 17"));
    }

    #[test]
    fn test_conflict_names_namespace() {
        let api: ApiError = OrchestratorError::AlreadyExists("team-a".to_string()).into();
        assert!(api.to_string().contains("team-a"));
    }

    #[test]
    fn test_missing_limit_range_is_conflict() {
        let api: ApiError = OrchestratorError::MissingLimitRange {
            namespace: "team-a".to_string(),
            limit_range: "default-limits",
        }
        .into();
        assert_eq!(api.status(), StatusCode::CONFLICT);
        assert!(api.to_string().contains("default-limits"));
    }
}
