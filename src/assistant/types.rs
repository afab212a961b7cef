//! Error and result types for sessions and job polling.

use crate::remote::{JobState, RemoteCallError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A message was posted before any session was opened.
    #[error("Session not initialized; create a session first")]
    UninitializedSession,
    /// The remote call itself failed.
    #[error("Failed to {action}: {source}")]
    Remote {
        /// Operation that was attempted.
        action: &'static str,
        /// Underlying transport or API failure.
        #[source]
        source: RemoteCallError,
    },
}

/// Errors raised while running a job to completion.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job could not be submitted.
    #[error("Failed to submit job: {0}")]
    Submit(#[source] RemoteCallError),
    /// Fetching the job status failed; polling stops at the first failure.
    #[error("Failed to poll job {job_id}: {source}")]
    Poll {
        /// Job being polled.
        job_id: String,
        /// Underlying transport or API failure.
        #[source]
        source: RemoteCallError,
    },
    /// The job reached a terminal state other than `completed`.
    #[error("Job {job_id} ended in state {state}")]
    Terminal {
        /// Job that ended.
        job_id: String,
        /// Terminal state reported by the service.
        state: JobState,
    },
    /// The job did not finish before the configured deadline.
    #[error("Job {job_id} still {last_state} after {waited:?}")]
    DeadlineExceeded {
        /// Job that was abandoned.
        job_id: String,
        /// Last state observed before giving up.
        last_state: JobState,
        /// Time spent waiting.
        waited: Duration,
        /// Whether the abandoned job was seen in a terminal state after it was cancelled.
        settled: bool,
    },
}

/// Timing limits applied while waiting for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the second poll; doubles after each non-terminal poll.
    pub interval: Duration,
    /// Upper bound for the delay between polls.
    pub max_interval: Duration,
    /// Total time allowed before the job is abandoned.
    pub max_wait: Duration,
    /// Time allowed for an abandoned job to settle after it was cancelled.
    pub cancel_grace: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            max_wait: Duration::from_secs(300),
            cancel_grace: Duration::from_secs(15),
        }
    }
}

impl PollPolicy {
    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_interval.max(self.interval))
    }
}

/// Successful job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// Identifier of the completed job.
    pub job_id: String,
    /// Number of status polls issued.
    pub polls: usize,
    /// Wall time between submission and completion.
    pub elapsed: Duration,
}
