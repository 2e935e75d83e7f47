//! Background analysis jobs.
//!
//! ## Design
//!
//! - Jobs are submitted, persisted as `pending` and processed by a detached
//!   task; the caller only gets the id back
//! - Every processing path ends in exactly one terminal state
//! - Terminal jobs move from the active keyspace into a bounded history
//! - Storage is durable (Redis) when reachable at first use, otherwise
//!   in-memory for the rest of the process lifetime
//!
//! ## Components
//!
//! - `JobStore`: get/put/remove/history/stats primitives, no business logic
//! - `InMemoryJobStore`, `RedisJobStore`: the two backends
//! - `FallbackJobStore`: probes the durable backend once and sticks with the result
//! - `JobOrchestrator`: owns the lifecycle and is the only writer of `status`

pub mod fallback;
pub mod handoff;
pub mod orchestrator;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;

pub use fallback::{BackendKind, FallbackJobStore, StoreMode, StoreSettings};
pub use handoff::{FixHandoff, PullRequestCreator};
pub use orchestrator::{JobHandle, JobOrchestrator, OrchestratorConfig, OrchestratorError};
#[cfg(feature = "redis")]
pub use redis_store::RedisJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
