//! Branch merges.
//!
//! Promoting or rebasing an edition branch is an asynchronous job on the terminology store, driven
//! by the same [`JobPoller`] as bulk member changes. The merge endpoint reports a conflicting
//! merge as `CONFLICTS`, which ends the job as a failure.

use crate::poller::JobPoller;
use crate::store::{CacheInvalidator, JobStatus, MergeRequest, TerminologyStore};
use crate::MappingResult;
use rms_types::BranchPath;
use std::sync::Arc;

const MERGE_FAILURE_STATES: &[&str] = &["CONFLICTS"];

#[derive(Clone)]
pub struct BranchMerger {
    store: Arc<dyn TerminologyStore>,
    poller: JobPoller,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl BranchMerger {
    pub fn new(
        store: Arc<dyn TerminologyStore>,
        poller: JobPoller,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            store,
            poller: poller.with_failure_states(MERGE_FAILURE_STATES),
            invalidator,
        }
    }

    /// Merge `source` into `target` and wait for the job to finish.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MappingError::BulkJobFailed`] if the merge fails or conflicts, and
    /// [`crate::MappingError::Timeout`] if it outlives the poll deadline.
    pub async fn merge(
        &self,
        source: &BranchPath,
        target: &BranchPath,
        comment: &str,
    ) -> MappingResult<JobStatus> {
        let request = MergeRequest {
            source: source.clone(),
            target: target.clone(),
            commit_comment: comment.to_string(),
        };
        tracing::info!(%source, %target, "starting branch merge");
        let job_url = self.store.start_merge(&request).await?;
        let status = self.poller.wait(self.store.as_ref(), &job_url).await?;
        self.invalidator.invalidate(target);
        tracing::info!(%source, %target, "branch merge completed");
        Ok(status)
    }
}
