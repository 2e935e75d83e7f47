//! Outbound seam to the pull-request collaborator.

use async_trait::async_trait;
use serde::Serialize;

use cifixer_core::{FixSuggestion, Job, PullRequestRef};

/// What a completed job hands to the pull-request collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixHandoff {
    pub repository: String,
    pub branch: Option<String>,
    pub fixes: Vec<FixSuggestion>,
    pub root_cause: String,
    pub explanation: Option<String>,
}

impl FixHandoff {
    /// `None` unless the job carries a diagnosis.
    pub fn from_job(job: &Job) -> Option<Self> {
        let diagnosis = job.diagnosis.as_ref()?;
        Some(Self {
            repository: job.repository.clone(),
            branch: job.branch.clone(),
            fixes: diagnosis.fixes.clone(),
            root_cause: diagnosis.root_cause.clone(),
            explanation: diagnosis.explanation.clone(),
        })
    }
}

/// Creates a pull request from a set of fixes. The core only stores the
/// returned reference.
#[async_trait]
pub trait PullRequestCreator: Send + Sync + 'static {
    async fn create(&self, handoff: &FixHandoff) -> anyhow::Result<PullRequestRef>;
}
