//! Job lifecycle: submission, background processing, terminal bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, instrument, warn};

use cifixer_ai::{AgentError, AnalysisAgent, ResponseInterpreter};
use cifixer_core::{
    AI_LOG_LENGTH, AnalysisRequest, Diagnosis, DomainError, Job, JobId, JobStats, JobStatus,
    MAX_HISTORY_SIZE, STORED_LOG_LENGTH, truncate_log,
};

use super::handoff::{FixHandoff, PullRequestCreator};
use super::store::{JobStore, JobStoreError};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Expiry applied to every active-record write.
    pub job_ttl: Duration,
    /// Error text kept on the job record.
    pub stored_log_length: usize,
    /// Error text handed to the agent.
    pub agent_log_length: usize,
    /// Upper bound for history reads.
    pub max_history: usize,
    /// Concurrent agent invocations; `None` means unbounded.
    pub max_concurrent_agents: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            job_ttl: Duration::from_secs(3600),
            stored_log_length: STORED_LOG_LENGTH,
            agent_log_length: AI_LOG_LENGTH,
            max_history: MAX_HISTORY_SIZE,
            max_concurrent_agents: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Everything that can end background processing early. Each one becomes a
/// `failed` job carrying the message.
#[derive(Debug, Error)]
enum ProcessError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Returned by [`JobOrchestrator::submit`]. Dropping it does not stop the work.
#[derive(Debug)]
pub struct JobHandle {
    pub id: JobId,
    task: JoinHandle<JobStatus>,
}

impl JobHandle {
    /// Wait for the job's terminal status.
    pub async fn finished(self) -> JobStatus {
        self.task.await.unwrap_or(JobStatus::Failed)
    }
}

/// Sole writer of job status.
#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    agent: Arc<dyn AnalysisAgent>,
    interpreter: ResponseInterpreter,
    pull_requests: Option<Arc<dyn PullRequestCreator>>,
    admission: Option<Arc<Semaphore>>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("agent", &self.agent.name())
            .field("pull_requests", &self.pull_requests.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        agent: Arc<dyn AnalysisAgent>,
        config: OrchestratorConfig,
    ) -> Self {
        let admission = config
            .max_concurrent_agents
            .map(|permits| Arc::new(Semaphore::new(permits.max(1))));
        Self {
            store,
            agent,
            interpreter: ResponseInterpreter::new(),
            pull_requests: None,
            admission,
            config,
        }
    }

    pub fn with_pull_request_creator(mut self, creator: Arc<dyn PullRequestCreator>) -> Self {
        self.pull_requests = Some(creator);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate, persist as `pending` and start background processing.
    ///
    /// Returns once the pending record is written; never waits on the agent.
    #[instrument(skip(self, request), fields(repository = %request.repository), err)]
    pub async fn submit(&self, request: AnalysisRequest) -> Result<JobHandle, OrchestratorError> {
        request.validate()?;

        let job = Job::pending(&request, self.config.stored_log_length);
        self.store.put(&job, self.config.job_ttl).await?;

        let id = job.id;
        info!(job_id = %id, agent = self.agent.name(), "job submitted");

        let span = info_span!("job", job_id = %id);
        let task = tokio::spawn(self.clone().supervise(job, request.error_text).instrument(span));
        Ok(JobHandle { id, task })
    }

    /// Active record first, then history.
    pub async fn get_status(&self, id: JobId) -> Result<Job, OrchestratorError> {
        match self.lookup(id).await? {
            Some(job) => Ok(job),
            None => Err(DomainError::not_found().into()),
        }
    }

    pub async fn stats(&self) -> Result<JobStats, OrchestratorError> {
        Ok(self.store.stats().await?)
    }

    /// Most-recent-first, capped at the configured history size.
    pub async fn history(&self, limit: usize) -> Result<Vec<Job>, OrchestratorError> {
        Ok(self
            .store
            .list_history(limit.min(self.config.max_history))
            .await?)
    }

    /// Run the agent and interpreter inline, without creating a job.
    #[instrument(skip(self, error_text), err)]
    pub async fn diagnose(&self, error_text: &str) -> Result<Diagnosis, OrchestratorError> {
        if error_text.trim().is_empty() {
            return Err(DomainError::validation("errorText is required").into());
        }
        let _permit = self.admit().await;
        let raw = self
            .agent
            .run(&truncate_log(error_text, self.config.agent_log_length))
            .await?;
        Ok(self.interpreter.interpret(&raw, error_text))
    }

    async fn lookup(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        if let Some(job) = self.store.get(id).await? {
            return Ok(Some(job));
        }
        let history = self.store.list_history(self.config.max_history).await?;
        Ok(history.into_iter().find(|job| job.id == id))
    }

    /// Waits for an agent slot when a gate is configured. The semaphore is
    /// never closed, so a failed acquire only means "no gate".
    async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        let gate = self.admission.clone()?;
        gate.acquire_owned().await.ok()
    }

    /// Task boundary: whatever happens inside `drive` (error or panic), the
    /// job ends in a terminal state.
    async fn supervise(self, job: Job, error_text: String) -> JobStatus {
        let snapshot = job.clone();
        let worker = self.clone();
        let outcome =
            tokio::spawn(async move { worker.drive(job, error_text).await }.in_current_span()).await;

        let message = match outcome {
            Ok(Ok(status)) => return status,
            Ok(Err(e)) => e.to_string(),
            Err(join) if join.is_panic() => "analysis task panicked".to_string(),
            Err(_) => "analysis task was cancelled".to_string(),
        };
        self.fail(snapshot, message).await
    }

    async fn drive(&self, mut job: Job, error_text: String) -> Result<JobStatus, ProcessError> {
        let _permit = self.admit().await;

        job.mark_processing()?;
        self.store.put(&job, self.config.job_ttl).await?;

        let input = truncate_log(&error_text, self.config.agent_log_length);
        let raw = self.agent.run(&input).await?;

        let diagnosis = self.interpreter.interpret(&raw, &error_text);
        if diagnosis.degraded {
            warn!(
                error_type = %diagnosis.error_type,
                "no structured agent output; used rule-based classification"
            );
        }

        if diagnosis.has_actionable_fix() {
            job.mark_completed(diagnosis)?;
            self.hand_off(&mut job).await;
        } else {
            job.mark_no_fix_found(diagnosis)?;
        }

        self.finish(&job).await?;
        Ok(job.status)
    }

    async fn hand_off(&self, job: &mut Job) {
        let (Some(creator), Some(handoff)) = (&self.pull_requests, FixHandoff::from_job(job)) else {
            return;
        };
        match creator.create(&handoff).await {
            Ok(pr) => {
                info!(pr_url = %pr.pr_url, pr_number = pr.pr_number, "pull request created");
                job.pull_request = Some(pr);
            }
            Err(e) => warn!(error = %e, "pull request creation failed"),
        }
    }

    /// Publish the terminal record, move it to history, drop the active key.
    async fn finish(&self, job: &Job) -> Result<(), JobStoreError> {
        self.store.put(job, self.config.job_ttl).await?;
        self.store.append_history(job).await?;
        self.store.remove(job.id).await?;
        info!(
            status = %job.status,
            confidence = job.confidence_score,
            "job finished"
        );
        Ok(())
    }

    async fn fail(&self, snapshot: Job, message: String) -> JobStatus {
        let latest = match self.lookup(snapshot.id).await {
            Ok(Some(job)) => job,
            Ok(None) => snapshot,
            Err(e) => {
                warn!(error = %e, "could not reload job before failing it");
                snapshot
            }
        };
        if latest.is_terminal() {
            // Already published; only the bookkeeping after it went wrong.
            self.settle(&latest).await;
            return latest.status;
        }

        let mut job = latest;
        if let Err(e) = job.mark_failed(message.as_str()) {
            error!(error = %e, "cannot mark job failed");
            return job.status;
        }
        warn!(error = %message, "job failed");

        if let Err(e) = self.finish(&job).await {
            error!(error = %e, "failed to persist terminal state");
        }
        JobStatus::Failed
    }

    /// Finish a relocation that stopped after the terminal record was
    /// published: push it to history unless already there, then drop the
    /// active key.
    async fn settle(&self, job: &Job) {
        let recorded = match self.store.list_history(self.config.max_history).await {
            Ok(history) => history.iter().any(|entry| entry.id == job.id),
            Err(e) => {
                error!(error = %e, "cannot read history to settle terminal job");
                return;
            }
        };
        if !recorded {
            if let Err(e) = self.store.append_history(job).await {
                error!(error = %e, "failed to move terminal job to history");
                return;
            }
        }
        if let Err(e) = self.store.remove(job.id).await {
            error!(error = %e, "failed to drop active record of terminal job");
        }
    }
}
