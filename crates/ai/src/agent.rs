use async_trait::async_trait;
use thiserror::Error;

/// Something that reasons over an error log and returns raw diagnosis text.
///
/// The returned text is *not* trusted to be structured; callers hand it to
/// [`crate::ResponseInterpreter`]. Implementations hold no per-call state and
/// may be invoked concurrently for independent jobs.
#[async_trait]
pub trait AnalysisAgent: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Analyse one error log.
    async fn run(&self, error_text: &str) -> Result<String, AgentError>;
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// The process could not be started (binary missing, permission denied).
    #[error("failed to launch agent `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited non-zero (`-1` when killed by a signal).
    #[error("agent process failed with code {exit_code}: {stderr}")]
    Failure { exit_code: i32, stderr: String },

    /// The process exceeded its configured wait bound and was killed.
    #[error("agent timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("agent i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Offline agent used when no external agent is configured.
///
/// Produces no structured output, so interpretation always lands on the
/// rule-based classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedAgent;

#[async_trait]
impl AnalysisAgent for RuleBasedAgent {
    fn name(&self) -> &str {
        "rule-based"
    }

    async fn run(&self, _error_text: &str) -> Result<String, AgentError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rule_based_agent_emits_nothing() {
        let out = RuleBasedAgent.run("npm ERR! missing module").await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn failure_message_carries_stderr() {
        let err = AgentError::Failure {
            exit_code: 1,
            stderr: "Traceback: boom".to_string(),
        };
        assert_eq!(err.to_string(), "agent process failed with code 1: Traceback: boom");
    }
}
