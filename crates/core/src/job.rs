//! Job records and their lifecycle.
//!
//! ```text
//! pending ──▶ processing ──▶ completed
//!    │             ├───────▶ no_fix_found
//!    └─────────────┴───────▶ failed
//! ```
//!
//! A `pending` job may go straight to `failed` when it never reaches the
//! agent: the `processing` write is rejected by the store, or the worker
//! dies before starting. Only `failed` is reachable that way; a diagnosis
//! always passes through `processing`.
//!
//! Terminal states are final: once a job is `completed`, `no_fix_found` or
//! `failed` no further transition is accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::diagnosis::{Diagnosis, PullRequestRef};
use crate::error::{DomainError, DomainResult};
use crate::id::JobId;
use crate::limits::truncate_chars;
use crate::request::AnalysisRequest;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, background processing not yet started
    Pending,
    /// The analysis agent is running
    Processing,
    /// Analysis produced at least one actionable fix
    Completed,
    /// Analysis or its bookkeeping failed
    Failed,
    /// Analysis finished without an actionable fix
    NoFixFound,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::NoFixFound)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::NoFixFound => "no_fix_found",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Processing) => true,
            // Never started: the processing write failed or the worker died.
            (JobStatus::Pending, JobStatus::Failed) => true,
            (JobStatus::Processing, n) => n.is_terminal(),
            _ => false,
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked unit of failure-analysis work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Originating error text, truncated at submission.
    pub error_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_metadata: Option<JsonValue>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
    /// Mirrors the diagnosis confidence; 0 until (and unless) one is recorded.
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_explanation: Option<String>,
    /// Human-readable failure message for `failed` jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a `pending` job from a (validated) submission.
    pub fn pending(request: &AnalysisRequest, stored_log_length: usize) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            repository: request.repository.trim().to_string(),
            workflow: request.workflow.clone(),
            branch: request.branch.clone(),
            commit: request.commit.clone(),
            error_text: truncate_chars(&request.error_text, stored_log_length).to_string(),
            job_metadata: request.job_metadata.clone(),
            status: JobStatus::Pending,
            diagnosis: None,
            confidence_score: 0.0,
            fix_explanation: None,
            error: None,
            pull_request: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: JobStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    fn record_diagnosis(&mut self, diagnosis: Diagnosis) {
        self.confidence_score = diagnosis.confidence_score;
        self.fix_explanation = diagnosis.explanation.clone();
        self.diagnosis = Some(diagnosis);
    }

    pub fn mark_processing(&mut self) -> DomainResult<()> {
        self.transition(JobStatus::Processing)
    }

    pub fn mark_completed(&mut self, diagnosis: Diagnosis) -> DomainResult<()> {
        self.transition(JobStatus::Completed)?;
        self.record_diagnosis(diagnosis);
        Ok(())
    }

    pub fn mark_no_fix_found(&mut self, diagnosis: Diagnosis) -> DomainResult<()> {
        self.transition(JobStatus::NoFixFound)?;
        self.record_diagnosis(diagnosis);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> DomainResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::FixSuggestion;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("acme/app", "npm ERR! missing module 'left-pad'")
    }

    fn diagnosis_with_fix() -> Diagnosis {
        Diagnosis {
            fixes: vec![FixSuggestion::new("package.json", "Install missing dependencies")],
            confidence_score: 0.7,
            explanation: Some("run npm install".to_string()),
            degraded: false,
            ..Diagnosis::unknown()
        }
    }

    #[test]
    fn pending_job_starts_with_zero_confidence() {
        let job = Job::pending(&request(), 2000);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.confidence_score, 0.0);
        assert!(job.completed_at.is_none());
        assert_eq!(job.repository, "acme/app");
    }

    #[test]
    fn stored_error_text_is_truncated() {
        let req = AnalysisRequest::new("acme/app", "x".repeat(5000));
        let job = Job::pending(&req, 2000);
        assert_eq!(job.error_text.chars().count(), 2000);
    }

    #[test]
    fn completed_lifecycle_records_diagnosis() {
        let mut job = Job::pending(&request(), 2000);
        job.mark_processing().unwrap();
        job.mark_completed(diagnosis_with_fix()).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.confidence_score, 0.7);
        assert_eq!(job.fix_explanation.as_deref(), Some("run npm install"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = Job::pending(&request(), 2000);
        job.mark_processing().unwrap();
        job.mark_failed("agent exited with code 1").unwrap();

        assert!(job.mark_processing().is_err());
        assert!(job.mark_completed(diagnosis_with_fix()).is_err());
        assert!(job.mark_failed("again").is_err());
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("agent exited with code 1"));
    }

    #[test]
    fn pending_cannot_skip_to_completed() {
        let mut job = Job::pending(&request(), 2000);
        let err = job.mark_completed(diagnosis_with_fix()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: JobStatus::Pending,
                to: JobStatus::Completed
            }
        );
    }

    #[test]
    fn pending_may_fail_directly() {
        let mut job = Job::pending(&request(), 2000);
        job.mark_failed("store unavailable").unwrap();
        assert!(job.is_terminal());
        assert!(job.completed_at.is_some());

        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::NoFixFound));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(JobStatus::NoFixFound).unwrap();
        assert_eq!(json, serde_json::json!("no_fix_found"));
    }
}
