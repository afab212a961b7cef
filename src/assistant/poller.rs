//! Submit a job and wait for it to reach a terminal state.

use crate::assistant::types::{JobError, JobResult, PollPolicy};
use crate::remote::{AgentHandle, JobHandle, JobState, ReasoningService, SessionHandle};
use tokio::time::{Instant, sleep};

/// Submits jobs and polls them until they finish, fail, or run out of time.
pub struct JobPoller<'a> {
    service: &'a dyn ReasoningService,
}

impl<'a> JobPoller<'a> {
    /// Poll jobs through `service`.
    pub fn new(service: &'a dyn ReasoningService) -> Self {
        Self { service }
    }

    /// Run `agent` against `session` and wait for the outcome.
    ///
    /// Returns `Ok` only when the job reports `completed`. Other terminal states, transport
    /// errors, and hitting `policy.max_wait` each stop polling and return a [`JobError`]. On a
    /// deadline the job is cancelled and polled until it settles or `policy.cancel_grace`
    /// runs out; [`JobError::DeadlineExceeded`] records which of the two happened.
    pub async fn run_and_await(
        &self,
        session: &SessionHandle,
        agent: &AgentHandle,
        policy: PollPolicy,
    ) -> Result<JobResult, JobError> {
        let started = Instant::now();
        let deadline = started + policy.max_wait;
        let job = self
            .service
            .submit_job(&session.id, &agent.id)
            .await
            .map_err(|source| {
                tracing::error!(session_id = %session.id, error = %source, "Job submission failed");
                JobError::Submit(source)
            })?;
        tracing::debug!(job_id = %job.id, session_id = %session.id, "Job submitted");

        let mut last_state = job.state;
        let mut delay = policy.interval;
        let mut polls = 0usize;

        loop {
            let state = self.service.get_job_status(&job).await.map_err(|source| {
                tracing::error!(job_id = %job.id, error = %source, "Job status poll failed");
                JobError::Poll {
                    job_id: job.id.clone(),
                    source,
                }
            })?;
            polls += 1;

            if state.rank() < last_state.rank() {
                tracing::warn!(
                    job_id = %job.id,
                    from = %last_state,
                    to = %state,
                    "Job state moved backwards"
                );
            }
            last_state = state;

            match state {
                JobState::Completed => {
                    let elapsed = started.elapsed();
                    tracing::info!(job_id = %job.id, polls, ?elapsed, "Job completed");
                    return Ok(JobResult {
                        job_id: job.id,
                        polls,
                        elapsed,
                    });
                }
                terminal if terminal.is_terminal() => {
                    tracing::warn!(job_id = %job.id, state = %terminal, polls, "Job ended without completing");
                    return Err(JobError::Terminal {
                        job_id: job.id,
                        state: terminal,
                    });
                }
                _ => {}
            }

            let now = Instant::now();
            if now >= deadline {
                let waited = now.duration_since(started);
                tracing::warn!(job_id = %job.id, state = %state, ?waited, "Job deadline exceeded");
                let settled = self.cancel_and_settle(&job, policy).await;
                return Err(JobError::DeadlineExceeded {
                    job_id: job.id,
                    last_state: state,
                    waited,
                    settled: settled.is_some(),
                });
            }

            tracing::trace!(job_id = %job.id, state = %state, ?delay, "Job pending");
            sleep(delay.min(deadline - now)).await;
            delay = policy.next_interval(delay);
        }
    }

    /// Cancel an abandoned job and keep polling it for up to `policy.cancel_grace`.
    ///
    /// Returns the terminal state once the job reports one, or `None` when it is still active
    /// after the grace period or its status can no longer be read.
    async fn cancel_and_settle(&self, job: &JobHandle, policy: PollPolicy) -> Option<JobState> {
        if let Err(error) = self.service.cancel_job(job).await {
            tracing::warn!(job_id = %job.id, error = %error, "Failed to cancel abandoned job");
        }

        let deadline = Instant::now() + policy.cancel_grace;
        let mut delay = policy.interval;
        loop {
            match self.service.get_job_status(job).await {
                Ok(state) if state.is_terminal() => {
                    tracing::info!(job_id = %job.id, state = %state, "Abandoned job settled");
                    return Some(state);
                }
                Ok(state) => {
                    tracing::trace!(job_id = %job.id, state = %state, "Waiting for abandoned job");
                }
                Err(error) => {
                    tracing::warn!(job_id = %job.id, error = %error, "Lost track of abandoned job");
                    return None;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(job_id = %job.id, "Abandoned job still active after cancellation");
                return None;
            }
            sleep(delay.min(deadline - now)).await;
            delay = policy.next_interval(delay);
        }
    }
}
