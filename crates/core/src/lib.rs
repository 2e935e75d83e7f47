//! `cifixer-core` — domain model for CI failure analysis jobs.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! job records and their lifecycle, diagnoses, submissions and the shared
//! size limits applied to error logs.

pub mod diagnosis;
pub mod error;
pub mod id;
pub mod job;
pub mod limits;
pub mod request;
pub mod stats;

pub use diagnosis::{Diagnosis, FixSuggestion, PullRequestRef, UNKNOWN_ERROR_TYPE};
pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use job::{Job, JobStatus};
pub use limits::{truncate_chars, truncate_log, AI_LOG_LENGTH, MAX_HISTORY_SIZE, STORED_LOG_LENGTH};
pub use request::AnalysisRequest;
pub use stats::JobStats;
