//! Collaborator seams of the engine.
//!
//! The engine talks to the outside world only through the traits here:
//! - [`TerminologyStore`]: the remote terminology engine that owns reference set members
//! - [`ConceptResolver`]: display names for target codes
//! - [`CacheInvalidator`]: branch-scoped caches that must be dropped after a mutation
//!
//! The HTTP implementation lives in the `snowstorm-client` crate; tests use in-memory fakes.

use crate::wire::RefsetMemberWire;
use crate::MappingResult;
use async_trait::async_trait;
use rms_types::BranchPath;
use serde::{Deserialize, Serialize};

/// Filter for reading the members that map one source code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberQuery {
    pub branch: BranchPath,
    pub refset_id: String,
    pub referenced_component_id: String,
    /// `None` returns active and inactive members.
    pub active: Option<bool>,
    /// `None` returns members of every module.
    pub module_id: Option<String>,
}

/// Status document of an asynchronous job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Members touched by a bulk member job, when the store reports them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,
}

/// Parsed job status. Only `COMPLETED` and `FAILED` are terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Completed,
    Failed,
    Pending(String),
}

impl JobStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    pub fn state(&self) -> JobState {
        let status = self.status.trim();
        if status.eq_ignore_ascii_case("COMPLETED") {
            JobState::Completed
        } else if status.eq_ignore_ascii_case("FAILED") {
            JobState::Failed
        } else {
            JobState::Pending(status.to_ascii_uppercase())
        }
    }
}

/// Request to merge one branch into another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub source: BranchPath,
    pub target: BranchPath,
    pub commit_comment: String,
}

/// The remote terminology engine.
///
/// Every method that fails with a non-success HTTP status returns
/// [`crate::MappingError::RemoteCallFailed`].
#[async_trait]
pub trait TerminologyStore: Send + Sync {
    async fn query_members(&self, query: &MemberQuery) -> MappingResult<Vec<RefsetMemberWire>>;

    async fn fetch_members(
        &self,
        branch: &BranchPath,
        member_ids: &[String],
    ) -> MappingResult<Vec<RefsetMemberWire>>;

    /// Create one member synchronously and return the stored representation.
    async fn create_member(
        &self,
        branch: &BranchPath,
        member: &RefsetMemberWire,
    ) -> MappingResult<RefsetMemberWire>;

    /// Update one member synchronously and return the stored representation.
    async fn update_member(
        &self,
        branch: &BranchPath,
        member: &RefsetMemberWire,
    ) -> MappingResult<RefsetMemberWire>;

    /// Submit a bulk create/update and return the job status URL.
    async fn submit_bulk(
        &self,
        branch: &BranchPath,
        members: &[RefsetMemberWire],
    ) -> MappingResult<String>;

    /// Delete members by id in one call. Not a job: the response is final.
    async fn delete_members(&self, branch: &BranchPath, member_ids: &[String]) -> MappingResult<()>;

    async fn job_status(&self, job_url: &str) -> MappingResult<JobStatus>;

    /// Start a branch merge and return the job status URL.
    async fn start_merge(&self, request: &MergeRequest) -> MappingResult<String>;
}

/// Resolves display names for codes.
#[async_trait]
pub trait ConceptResolver: Send + Sync {
    /// Whether codes of `terminology` can be resolved at all.
    fn resolves(&self, _terminology: &str) -> bool {
        true
    }

    /// Returns `None` when the code is unknown or the terminology is not resolvable.
    async fn resolve_concept_name(
        &self,
        terminology: &str,
        version: &str,
        code: &str,
    ) -> MappingResult<Option<String>>;
}

/// Branch-scoped caches dropped after every mutation batch, whether or not it succeeded.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, branch: &BranchPath);
}
