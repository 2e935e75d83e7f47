//! Inbound analysis submissions.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{DomainError, DomainResult};

/// A CI failure submitted for analysis.
///
/// Field aliases accept the payload shapes older clients send
/// (`repoUrl`/`logData`/`commitHash`/`workflowId`, `errorLog`, `error_log`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default, alias = "repoUrl")]
    pub repository: String,
    #[serde(default, alias = "workflowId")]
    pub workflow: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, alias = "commitHash")]
    pub commit: Option<String>,
    #[serde(default, alias = "logData", alias = "errorLog", alias = "error_log", alias = "error_text")]
    pub error_text: String,
    #[serde(default)]
    pub job_metadata: Option<JsonValue>,
}

impl AnalysisRequest {
    pub fn new(repository: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            error_text: error_text.into(),
            ..Default::default()
        }
    }

    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.job_metadata = Some(metadata);
        self
    }

    /// Reject submissions missing a repository or error text.
    pub fn validate(&self) -> DomainResult<()> {
        if self.repository.trim().is_empty() {
            return Err(DomainError::validation("repository is required"));
        }
        if self.error_text.trim().is_empty() {
            return Err(DomainError::validation("errorText cannot be empty"));
        }
        Ok(())
    }
}
