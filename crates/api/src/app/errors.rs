use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use cifixer_core::DomainError;
use cifixer_infra::jobs::OrchestratorError;

pub fn orchestrator_error_to_response(err: OrchestratorError) -> axum::response::Response {
    match err {
        OrchestratorError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        OrchestratorError::Domain(DomainError::NotFound) | OrchestratorError::Domain(DomainError::InvalidId(_)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "Job not found")
        }
        OrchestratorError::Domain(e @ DomainError::InvalidTransition { .. }) => {
            json_error(StatusCode::CONFLICT, "invalid_transition", e.to_string())
        }
        OrchestratorError::Store(e) => {
            tracing::error!(error = %e, "job store error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        OrchestratorError::Agent(e) => json_error(StatusCode::BAD_GATEWAY, "agent_error", e.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
