use serde::{Deserialize, Serialize};

use cifixer_core::{Diagnosis, JobId, JobStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Body of the synchronous `POST /api/fix`.
#[derive(Debug, Deserialize)]
pub struct FixRequest {
    #[serde(default, alias = "errorLog", alias = "errorText")]
    pub error_log: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeAccepted {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: &'static str,
    pub status_url: String,
}

impl AnalyzeAccepted {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            message: "Analysis job submitted successfully.",
            status_url: format!("/api/status/{job_id}"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FixResponse {
    pub status: JobStatus,
    pub fix: Diagnosis,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub store: &'static str,
}
