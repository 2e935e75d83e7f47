//! Redis-backed job store (durable backend).
//!
//! ## Layout
//!
//! - **Active jobs**: `job:{id}` string keys holding the JSON record, with `EX` = ttl
//! - **History**: `job_history` list, newest at the head, trimmed with `LTRIM`
//!
//! Push + trim run in one `MULTI` block so concurrent completions cannot
//! leave the list longer than the bound.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::{instrument, warn};

use cifixer_core::{Job, JobId, JobStats};

use super::store::{JobStore, JobStoreError};

/// Default key prefix for active jobs
const DEFAULT_JOB_KEY_PREFIX: &str = "job:";

/// Default history list key
const DEFAULT_HISTORY_KEY: &str = "job_history";

/// Page size used when counting active keys with SCAN
const SCAN_PAGE: usize = 500;

#[derive(Clone)]
pub struct RedisJobStore {
    conn: MultiplexedConnection,
    job_key_prefix: String,
    history_key: String,
    max_history: usize,
}

impl std::fmt::Debug for RedisJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisJobStore")
            .field("job_key_prefix", &self.job_key_prefix)
            .field("history_key", &self.history_key)
            .field("max_history", &self.max_history)
            .finish_non_exhaustive()
    }
}

fn storage(op: &'static str) -> impl Fn(redis::RedisError) -> JobStoreError {
    move |e| JobStoreError::Storage(format!("{op} failed: {e}"))
}

impl RedisJobStore {
    /// Connect and verify the server answers `PING` within `timeout`.
    ///
    /// Any failure is reported as [`JobStoreError::Unavailable`].
    pub async fn connect(
        redis_url: impl AsRef<str>,
        timeout: Duration,
        max_history: usize,
    ) -> Result<Self, JobStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;

        let probe = async {
            let mut conn = client.get_multiplexed_tokio_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(conn)
        };

        let conn = tokio::time::timeout(timeout, probe)
            .await
            .map_err(|_| JobStoreError::Unavailable(format!("no answer within {timeout:?}")))?
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            conn,
            job_key_prefix: DEFAULT_JOB_KEY_PREFIX.to_string(),
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            max_history,
        })
    }

    /// Use a custom key namespace (e.g. to share one Redis between deployments).
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.job_key_prefix = format!("{namespace}:{DEFAULT_JOB_KEY_PREFIX}");
        self.history_key = format!("{namespace}:{DEFAULT_HISTORY_KEY}");
        self
    }

    fn job_key(&self, id: JobId) -> String {
        format!("{}{}", self.job_key_prefix, id)
    }

    async fn count_active(&self) -> Result<usize, JobStoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.job_key_prefix);
        let mut cursor: u64 = 0;
        let mut count = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_PAGE)
                .query_async(&mut conn)
                .await
                .map_err(storage("SCAN"))?;
            count += keys.len();
            if next == 0 {
                return Ok(count);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn put(&self, job: &Job, ttl: Duration) -> Result<(), JobStoreError> {
        let payload =
            serde_json::to_string(job).map_err(|e| JobStoreError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();

        let _: () = redis::cmd("SET")
            .arg(self.job_key(job.id))
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(storage("SET"))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(self.job_key(id))
            .query_async(&mut conn)
            .await
            .map_err(storage("GET"))?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(|e| JobStoreError::Serialization(e.to_string())))
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn remove(&self, id: JobId) -> Result<(), JobStoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(self.job_key(id))
            .query_async(&mut conn)
            .await
            .map_err(storage("DEL"))?;
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn append_history(&self, job: &Job) -> Result<(), JobStoreError> {
        let payload =
            serde_json::to_string(job).map_err(|e| JobStoreError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        let last = self.max_history.max(1) as isize - 1;

        let _: () = redis::pipe()
            .atomic()
            .cmd("LPUSH")
            .arg(&self.history_key)
            .arg(payload)
            .ignore()
            .cmd("LTRIM")
            .arg(&self.history_key)
            .arg(0)
            .arg(last)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(storage("LPUSH/LTRIM"))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_history(&self, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let entries: Vec<String> = redis::cmd("LRANGE")
            .arg(&self.history_key)
            .arg(0)
            .arg(limit.min(isize::MAX as usize) as isize - 1)
            .query_async(&mut conn)
            .await
            .map_err(storage("LRANGE"))?;

        Ok(entries
            .iter()
            .filter_map(|raw| match serde_json::from_str::<Job>(raw) {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable history entry");
                    None
                }
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        let history = self.list_history(self.max_history).await?;
        let active = self.count_active().await?;
        Ok(JobStats::from_history(&history, active))
    }
}

/// These need a live server: `REDIS_URL=redis://localhost:6379 cargo test
/// -p cifixer-infra --features redis -- --ignored`. Each test works in its own
/// key namespace.
#[cfg(test)]
mod tests {
    use super::*;
    use cifixer_core::{AnalysisRequest, Diagnosis, FixSuggestion, JobStatus};

    const TTL: Duration = Duration::from_secs(60);

    async fn store(max_history: usize) -> RedisJobStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        RedisJobStore::connect(&url, Duration::from_secs(2), max_history)
            .await
            .expect("redis reachable")
            .with_namespace(&format!("cifixer-test-{}", JobId::new()))
    }

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
            _ => job.mark_failed("boom").unwrap(),
        }
        job
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn put_then_get_round_trips() {
        let store = store(10).await;
        let job = finished("acme/app", JobStatus::Completed);
        store.put(&job, TTL).await.unwrap();

        assert_eq!(store.get(job.id).await.unwrap(), Some(job.clone()));

        store.remove(job.id).await.unwrap();
        assert_eq!(store.get(job.id).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn history_is_bounded_and_newest_first() {
        let store = store(3).await;
        let jobs: Vec<_> = (0..4).map(|i| finished(&format!("repo/{i}"), JobStatus::Completed)).collect();
        for j in &jobs {
            store.append_history(j).await.unwrap();
        }

        let history = store.list_history(3).await.unwrap();
        let repos: Vec<_> = history.iter().map(|j| j.repository.as_str()).collect();
        assert_eq!(repos, vec!["repo/3", "repo/2", "repo/1"]);
        assert_eq!(store.list_history(50).await.unwrap().len(), 3);
        assert!(store.list_history(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn stats_count_history_and_active() {
        let store = store(10).await;
        store.put(&job("acme/active"), TTL).await.unwrap();
        for status in [JobStatus::Completed, JobStatus::Completed, JobStatus::Failed] {
            store.append_history(&finished("acme/app", status)).await.unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
