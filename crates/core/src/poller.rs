//! Async job poller.
//!
//! Bulk member changes and branch merges are queued by the terminology store and reported through
//! a job status URL. [`JobPoller::wait`] polls that URL at a fixed interval until the job reaches
//! a terminal state or the deadline passes.
//!
//! The first poll is immediate. Each non-terminal status is followed by one wait-then-poll cycle,
//! so a job that has already finished costs a single status call and no wait.
//!
//! Polling runs as a future: dropping it stops polling, and callers may wrap it in their own
//! timeout on top of the configured deadline.

use crate::config::CoreConfig;
use crate::store::{JobState, JobStatus, TerminologyStore};
use crate::{MappingError, MappingResult};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobPoller {
    interval: Duration,
    deadline: Option<Duration>,
    /// Extra non-`FAILED` statuses that end a job unsuccessfully.
    failure_states: &'static [&'static str],
}

impl JobPoller {
    /// `deadline` of `None` polls until the job is terminal.
    pub fn new(interval: Duration, deadline: Option<Duration>) -> Self {
        Self {
            interval,
            deadline,
            failure_states: &[],
        }
    }

    /// Treat `states` (compared case-insensitively) as terminal failures, as `FAILED` is.
    pub fn with_failure_states(mut self, states: &'static [&'static str]) -> Self {
        self.failure_states = states;
        self
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(cfg.poll_interval(), cfg.poll_deadline())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `job_url` until the job completes.
    ///
    /// # Returns
    ///
    /// The final status document on `COMPLETED`.
    ///
    /// # Errors
    ///
    /// - [`MappingError::BulkJobFailed`] on `FAILED`, carrying the store's message
    /// - [`MappingError::Timeout`] when the deadline passes first
    /// - any error from the status call itself
    pub async fn wait(&self, store: &dyn TerminologyStore, job_url: &str) -> MappingResult<JobStatus> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            let status = store.job_status(job_url).await?;
            polls += 1;

            match status.state() {
                JobState::Completed => {
                    tracing::debug!(job = job_url, polls, "job completed");
                    return Ok(status);
                }
                JobState::Failed => {
                    let message = status
                        .message
                        .clone()
                        .unwrap_or_else(|| "no message from terminology server".into());
                    tracing::warn!(job = job_url, %message, "job failed");
                    return Err(MappingError::BulkJobFailed {
                        url: job_url.to_string(),
                        message,
                    });
                }
                JobState::Pending(state)
                    if self.failure_states.iter().any(|s| s.eq_ignore_ascii_case(&state)) =>
                {
                    let message = status
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("job ended in {state}"));
                    tracing::warn!(job = job_url, %message, "job ended unsuccessfully");
                    return Err(MappingError::BulkJobFailed {
                        url: job_url.to_string(),
                        message,
                    });
                }
                JobState::Pending(state) => {
                    tracing::debug!(job = job_url, state = %state, polls, "job not finished");
                }
            }

            if let Some(deadline) = self.deadline {
                let waited = started.elapsed();
                if waited + self.interval > deadline {
                    tracing::error!(job = job_url, ?waited, "job deadline exceeded");
                    return Err(MappingError::Timeout {
                        url: job_url.to_string(),
                        waited,
                    });
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
