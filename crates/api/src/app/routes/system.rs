use std::sync::Arc;

use axum::{Json, extract::Extension};
use chrono::Utc;

use cifixer_infra::jobs::BackendKind;

use crate::app::dto::HealthResponse;
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Json<HealthResponse> {
    let store = match services.backend().await {
        BackendKind::Durable => "redis",
        BackendKind::Memory => "memory",
    };
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        store,
    })
}
