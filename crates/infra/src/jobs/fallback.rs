//! Sticky backend selection: durable when reachable at first use, otherwise
//! in-memory for the rest of the process lifetime.
//!
//! The probe runs exactly once (concurrent first callers wait on the same
//! probe). There is no re-probing and no switching back.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use cifixer_core::{Job, JobId, JobStats, MAX_HISTORY_SIZE};

#[cfg(feature = "redis")]
use super::redis_store::RedisJobStore;
use super::store::{InMemoryJobStore, JobStore, JobStoreError};

/// How the backend is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Probe the durable backend, fall back to memory when unreachable
    Auto,
    /// Never probe; use the in-memory backend
    Memory,
}

/// Which backend ended up serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Durable,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub mode: StoreMode,
    pub redis_url: String,
    pub connect_timeout: Duration,
    pub max_history: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            mode: StoreMode::Auto,
            redis_url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(2),
            max_history: MAX_HISTORY_SIZE,
        }
    }
}

enum Backend {
    #[cfg(feature = "redis")]
    Durable(RedisJobStore),
    Memory(InMemoryJobStore),
}

impl Backend {
    fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "redis")]
            Backend::Durable(_) => BackendKind::Durable,
            Backend::Memory(_) => BackendKind::Memory,
        }
    }

    fn store(&self) -> &dyn JobStore {
        match self {
            #[cfg(feature = "redis")]
            Backend::Durable(s) => s,
            Backend::Memory(s) => s,
        }
    }
}

/// Job store that selects its backend once, on first use.
pub struct FallbackJobStore {
    settings: StoreSettings,
    backend: OnceCell<Backend>,
}

impl std::fmt::Debug for FallbackJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackJobStore")
            .field("mode", &self.settings.mode)
            .field("backend", &self.backend.get().map(Backend::kind))
            .finish()
    }
}

impl FallbackJobStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings,
            backend: OnceCell::new(),
        }
    }

    /// A store that is in-memory from the start.
    pub fn in_memory(max_history: usize) -> Self {
        Self::new(StoreSettings {
            mode: StoreMode::Memory,
            max_history,
            ..StoreSettings::default()
        })
    }

    /// The selected backend, probing first if nothing is selected yet.
    pub async fn backend_kind(&self) -> BackendKind {
        self.backend().await.kind()
    }

    async fn backend(&self) -> &Backend {
        self.backend.get_or_init(|| self.select()).await
    }

    async fn select(&self) -> Backend {
        let memory = || Backend::Memory(InMemoryJobStore::new(self.settings.max_history));

        if self.settings.mode == StoreMode::Memory {
            info!(backend = "memory", "job store configured in-memory");
            return memory();
        }

        match self.probe().await {
            Ok(backend) => {
                info!(backend = "redis", "durable job store connected");
                backend
            }
            Err(e) => {
                warn!(
                    backend = "memory",
                    error = %e,
                    "durable job store unreachable; using in-memory fallback for this process"
                );
                memory()
            }
        }
    }

    #[cfg(feature = "redis")]
    async fn probe(&self) -> Result<Backend, JobStoreError> {
        let s = &self.settings;
        RedisJobStore::connect(&s.redis_url, s.connect_timeout, s.max_history)
            .await
            .map(Backend::Durable)
    }

    #[cfg(not(feature = "redis"))]
    async fn probe(&self) -> Result<Backend, JobStoreError> {
        Err(JobStoreError::Unavailable(
            "built without the `redis` feature".to_string(),
        ))
    }
}

#[async_trait]
impl JobStore for FallbackJobStore {
    async fn put(&self, job: &Job, ttl: Duration) -> Result<(), JobStoreError> {
        self.backend().await.store().put(job, ttl).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.backend().await.store().get(id).await
    }

    async fn remove(&self, id: JobId) -> Result<(), JobStoreError> {
        self.backend().await.store().remove(id).await
    }

    async fn append_history(&self, job: &Job) -> Result<(), JobStoreError> {
        self.backend().await.store().append_history(job).await
    }

    async fn list_history(&self, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        self.backend().await.store().list_history(limit).await
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        self.backend().await.store().stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cifixer_core::{AnalysisRequest, JobStatus};

    /// Nothing listens on port 1; the connection is refused immediately.
    fn unreachable() -> StoreSettings {
        StoreSettings {
            mode: StoreMode::Auto,
            redis_url: "redis://127.0.0.1:1".to_string(),
            connect_timeout: Duration::from_millis(500),
            max_history: 10,
        }
    }

    fn job() -> Job {
        Job::pending(&AnalysisRequest::new("acme/app", "npm ERR! missing module"), 2000)
    }

    #[tokio::test]
    async fn unreachable_backend_falls_back_to_memory() {
        let store = FallbackJobStore::new(unreachable());

        let job = job();
        store.put(&job, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(job.id).await.unwrap(), Some(job.clone()));
        assert_eq!(store.backend_kind().await, BackendKind::Memory);
    }

    #[tokio::test]
    async fn stats_reflect_fallback_writes() {
        let store = FallbackJobStore::new(unreachable());

        store.put(&job(), Duration::from_secs(60)).await.unwrap();
        let mut done = job();
        done.mark_processing().unwrap();
        done.mark_failed("agent exited with code 1").unwrap();
        store.append_history(&done).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(store.list_history(5).await.unwrap()[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn selection_is_sticky() {
        let store = FallbackJobStore::new(unreachable());
        let job = job();
        store.put(&job, Duration::from_secs(60)).await.unwrap();

        // Later calls keep hitting the same in-memory backend.
        for _ in 0..3 {
            assert_eq!(store.backend_kind().await, BackendKind::Memory);
            assert!(store.get(job.id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn memory_mode_skips_probe() {
        let store = FallbackJobStore::in_memory(5);
        assert_eq!(store.backend_kind().await, BackendKind::Memory);
    }
}
