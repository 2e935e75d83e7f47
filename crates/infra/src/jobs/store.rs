//! Job storage abstraction and the in-memory backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use cifixer_core::{Job, JobId, JobStats};

/// Job store abstraction.
///
/// Storage only: callers decide what to write, the store never inspects or
/// changes job state. Every backend must behave identically through this
/// interface.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Upsert an active job record. Durable backends may drop it once `ttl`
    /// passes without another write.
    async fn put(&self, job: &Job, ttl: Duration) -> Result<(), JobStoreError>;

    /// Get an active job by id.
    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Drop an active job record (no-op when absent).
    async fn remove(&self, id: JobId) -> Result<(), JobStoreError>;

    /// Push a snapshot to the front of the history, trimming the oldest
    /// entries beyond the configured maximum.
    async fn append_history(&self, job: &Job) -> Result<(), JobStoreError>;

    /// The most recent `limit` history entries, most-recent-first.
    async fn list_history(&self, limit: usize) -> Result<Vec<Job>, JobStoreError>;

    /// Counters over history plus the number of active records.
    async fn stats(&self) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    /// The durable backend could not be reached. Only produced while probing.
    #[error("durable job store unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// In-process job store. Entries never expire.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    history: Mutex<VecDeque<Job>>,
    max_history: usize,
}

impl InMemoryJobStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(max_history.min(1024))),
            max_history,
        }
    }

    pub fn arc(max_history: usize) -> Arc<Self> {
        Arc::new(Self::new(max_history))
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(cifixer_core::MAX_HISTORY_SIZE)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, job: &Job, _ttl: Duration) -> Result<(), JobStoreError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn remove(&self, id: JobId) -> Result<(), JobStoreError> {
        self.jobs.write().await.remove(&id);
        Ok(())
    }

    async fn append_history(&self, job: &Job) -> Result<(), JobStoreError> {
        // Push and trim under one lock so concurrent completions cannot
        // grow the ring past its bound.
        let mut history = self.history.lock().await;
        history.push_front(job.clone());
        history.truncate(self.max_history);
        Ok(())
    }

    async fn list_history(&self, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        let history = self.history.lock().await;
        Ok(history.iter().take(limit).cloned().collect())
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        let active = self.jobs.read().await.len();
        let history = self.history.lock().await;
        Ok(JobStats::from_history(history.iter(), active))
    }
}

#[async_trait]
impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    async fn put(&self, job: &Job, ttl: Duration) -> Result<(), JobStoreError> {
        (**self).put(job, ttl).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(id).await
    }

    async fn remove(&self, id: JobId) -> Result<(), JobStoreError> {
        (**self).remove(id).await
    }

    async fn append_history(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).append_history(job).await
    }

    async fn list_history(&self, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        (**self).list_history(limit).await
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cifixer_core::{AnalysisRequest, Diagnosis, FixSuggestion, JobStatus};

    const TTL: Duration = Duration::from_secs(3600);

    fn job(repo: &str) -> Job {
        Job::pending(&AnalysisRequest::new(repo, "npm ERR! missing module"), 2000)
    }

    fn finished(repo: &str, status: JobStatus) -> Job {
        let mut job = job(repo);
        job.mark_processing().unwrap();
        match status {
            JobStatus::Completed => job
                .mark_completed(Diagnosis {
                    fixes: vec![FixSuggestion::new("package.json", "Install missing dependencies")],
                    ..Diagnosis::unknown()
                })
                .unwrap(),
            JobStatus::NoFixFound => job.mark_no_fix_found(Diagnosis::unknown()).unwrap(),
            _ => job.mark_failed("boom").unwrap(),
        }
        job
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryJobStore::new(10);
        let job = job("acme/app");
        store.put(&job, TTL).await.unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded, job);
    }

    #[tokio::test]
    async fn put_overwrites_and_remove_deletes() {
        let store = InMemoryJobStore::new(10);
        let mut job = job("acme/app");
        store.put(&job, TTL).await.unwrap();

        job.mark_processing().unwrap();
        store.put(&job, TTL).await.unwrap();
        assert_eq!(store.get(job.id).await.unwrap().unwrap().status, JobStatus::Processing);

        store.remove(job.id).await.unwrap();
        assert!(store.get(job.id).await.unwrap().is_none());
        store.remove(job.id).await.unwrap();
    }

    #[tokio::test]
    async fn history_is_bounded_and_newest_first() {
        let store = InMemoryJobStore::new(3);
        let jobs: Vec<_> = (0..4).map(|i| finished(&format!("repo/{i}"), JobStatus::Completed)).collect();
        for j in &jobs {
            store.append_history(j).await.unwrap();
        }

        let history = store.list_history(3).await.unwrap();
        let repos: Vec<_> = history.iter().map(|j| j.repository.as_str()).collect();
        assert_eq!(repos, vec!["repo/3", "repo/2", "repo/1"]);
        assert!(history.iter().all(|j| j.id != jobs[0].id));

        assert_eq!(store.list_history(1).await.unwrap().len(), 1);
        assert_eq!(store.list_history(50).await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_never_exceed_bound() {
        let store = InMemoryJobStore::arc(5);
        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_history(&finished(&format!("repo/{i}"), JobStatus::Failed))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(store.list_history(100).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn stats_count_history_and_active() {
        let store = InMemoryJobStore::new(10);
        store.put(&job("acme/active"), TTL).await.unwrap();
        for status in [JobStatus::Completed, JobStatus::Completed, JobStatus::Failed, JobStatus::NoFixFound] {
            store.append_history(&finished("acme/app", status)).await.unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.no_fix_found, 1);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_store_reports_zero_success_rate() {
        let stats = InMemoryJobStore::default().stats().await.unwrap();
        assert_eq!(stats, JobStats::default());
    }
}
