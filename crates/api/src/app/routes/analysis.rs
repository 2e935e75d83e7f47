use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use cifixer_core::{AnalysisRequest, JobId, JobStatus, MAX_HISTORY_SIZE};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Accepts a failure for background analysis and answers `202` right away.
pub async fn analyze(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<AnalysisRequest>,
) -> axum::response::Response {
    match services.orchestrator.submit(body).await {
        Ok(handle) => (StatusCode::ACCEPTED, Json(dto::AnalyzeAccepted::new(handle.id))).into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}

pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    // Ids are opaque to callers; anything unparseable is simply unknown.
    let Ok(id) = id.parse::<JobId>() else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "Job not found");
    };
    match services.orchestrator.get_status(id).await {
        Ok(job) => Json(job).into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.orchestrator.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::HistoryQuery>,
) -> axum::response::Response {
    let limit = query.limit.unwrap_or(MAX_HISTORY_SIZE);
    match services.orchestrator.history(limit).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}

/// Legacy synchronous analysis: no job is created.
pub async fn fix(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::FixRequest>,
) -> axum::response::Response {
    match services.orchestrator.diagnose(&body.error_log).await {
        Ok(fix) => Json(dto::FixResponse {
            status: JobStatus::Completed,
            fix,
        })
        .into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}
