//! Infrastructure layer: job storage, the external agent bridge, job
//! orchestration and configuration.

pub mod agent;
pub mod config;
pub mod jobs;

pub use config::CiFixerConfig;
