//! Aggregate counters over the job history.

use serde::{Deserialize, Serialize};

use crate::job::{Job, JobStatus};

/// Monitoring view over history plus the active keyspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    /// Entries currently retained in history.
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub no_fix_found: usize,
    /// completed / (completed + failed); 0 when nothing has finished.
    pub success_rate: f64,
}

impl JobStats {
    pub fn from_history<'a>(history: impl IntoIterator<Item = &'a Job>, active: usize) -> Self {
        let mut stats = JobStats {
            active,
            ..Default::default()
        };

        for job in history {
            stats.total += 1;
            match job.status {
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::NoFixFound => stats.no_fix_found += 1,
                JobStatus::Pending | JobStatus::Processing => {}
            }
        }

        stats.success_rate = success_rate(stats.completed, stats.failed);
        stats
    }
}

pub fn success_rate(completed: usize, failed: usize) -> f64 {
    let finished = completed + failed;
    if finished == 0 {
        0.0
    } else {
        completed as f64 / finished as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::AnalysisRequest;

    fn finished(status: JobStatus) -> Job {
        let mut job = Job::pending(&AnalysisRequest::new("acme/app", "boom"), 2000);
        job.status = status;
        job
    }

    #[test]
    fn success_rate_is_zero_without_finished_jobs() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(JobStats::from_history([], 3).success_rate, 0.0);
    }

    #[test]
    fn counts_by_terminal_status() {
        let history = vec![
            finished(JobStatus::Completed),
            finished(JobStatus::Completed),
            finished(JobStatus::Completed),
            finished(JobStatus::Failed),
            finished(JobStatus::NoFixFound),
        ];
        let stats = JobStats::from_history(&history, 2);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.no_fix_found, 1);
        assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
    }
}
