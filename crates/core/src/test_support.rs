//! In-memory collaborators for engine tests.
//!
//! [`FakeStore`] behaves like a small terminology server: it assigns member ids, keeps the
//! released flag it owns, refuses to delete released members, runs bulk changes as scripted jobs
//! and records every call so tests can assert on the remote traffic.

use crate::store::{
    CacheInvalidator, ConceptResolver, JobStatus, MemberQuery, MergeRequest, TerminologyStore,
};
use crate::wire::RefsetMemberWire;
use crate::{MappingError, MappingResult};
use async_trait::async_trait;
use rms_types::BranchPath;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Query,
    Fetch(usize),
    Create,
    Update(String),
    Bulk(usize),
    Delete(Vec<String>),
    Status(String),
    Merge,
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Create | Call::Update(_) | Call::Bulk(_) | Call::Delete(_) | Call::Merge
        )
    }
}

#[derive(Default)]
struct State {
    members: BTreeMap<String, RefsetMemberWire>,
    next_id: u64,
    next_job: u64,
    calls: Vec<Call>,
    jobs: HashMap<String, VecDeque<JobStatus>>,
    fail_bulk_submit: Option<u16>,
    fail_bulk_job: Option<String>,
    omit_job_member_ids: bool,
    stall_bulk_job: bool,
    fail_updates: bool,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a member exactly as given (ids and released flags included).
    pub fn seed(&self, member: RefsetMemberWire) {
        let mut state = self.state.lock().expect("fake store lock");
        let id = member.member_id.clone().expect("seeded members need an id");
        state.members.insert(id, member);
    }

    pub fn members(&self) -> Vec<RefsetMemberWire> {
        self.state
            .lock()
            .expect("fake store lock")
            .members
            .values()
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().expect("fake store lock").calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().expect("fake store lock").calls.clear();
    }

    pub fn status_calls(&self, url: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status(u) if u == url))
            .count()
    }

    /// Script the statuses a job URL reports; the last one repeats forever.
    pub fn script_job(&self, url: &str, statuses: &[&str]) {
        let mut state = self.state.lock().expect("fake store lock");
        state.jobs.insert(
            url.to_string(),
            statuses.iter().map(|s| JobStatus::new(*s)).collect(),
        );
    }

    pub fn script_job_failure(&self, url: &str, message: &str) {
        let mut state = self.state.lock().expect("fake store lock");
        let failed = JobStatus {
            message: Some(message.to_string()),
            ..JobStatus::new("FAILED")
        };
        state
            .jobs
            .insert(url.to_string(), VecDeque::from(vec![JobStatus::new("RUNNING"), failed]));
    }

    /// Make the next bulk submission fail with `status`.
    pub fn fail_next_bulk_submit(&self, status: u16) {
        self.state.lock().expect("fake store lock").fail_bulk_submit = Some(status);
    }

    /// Make the next bulk job end in `FAILED` without applying its changes.
    pub fn fail_next_bulk_job(&self, message: &str) {
        self.state.lock().expect("fake store lock").fail_bulk_job = Some(message.to_string());
    }

    /// Apply the next bulk job's changes but leave its status `RUNNING` forever.
    pub fn stall_next_bulk_job(&self) {
        self.state.lock().expect("fake store lock").stall_bulk_job = true;
    }

    /// Report completed bulk jobs without member ids.
    pub fn omit_job_member_ids(&self) {
        self.state.lock().expect("fake store lock").omit_job_member_ids = true;
    }

    /// Reject every single-member update.
    pub fn fail_updates(&self) {
        self.state.lock().expect("fake store lock").fail_updates = true;
    }

    fn remote_error(url: &str, status: u16, reason: &str) -> MappingError {
        MappingError::RemoteCallFailed {
            url: url.to_string(),
            status,
            reason: reason.to_string(),
        }
    }
}

impl State {
    fn insert_new(&mut self, member: &RefsetMemberWire) -> RefsetMemberWire {
        self.next_id += 1;
        let mut stored = member.clone();
        stored.member_id = Some(format!("member-{}", self.next_id));
        stored.released = false;
        stored.effective_time = None;
        self.members
            .insert(stored.member_id.clone().unwrap_or_default(), stored.clone());
        stored
    }

    fn apply_update(&mut self, member: &RefsetMemberWire) -> MappingResult<RefsetMemberWire> {
        let id = member.member_id.clone().unwrap_or_default();
        let Some(current) = self.members.get(&id) else {
            return Err(FakeStore::remote_error(&format!("members/{id}"), 404, "Not Found"));
        };
        let mut stored = member.clone();
        stored.released = current.released;
        stored.effective_time = None;
        self.members.insert(id, stored.clone());
        Ok(stored)
    }

    fn new_job(&mut self, prefix: &str, final_status: JobStatus) -> String {
        self.next_job += 1;
        let url = format!("{prefix}/{}", self.next_job);
        self.jobs.insert(
            url.clone(),
            VecDeque::from(vec![JobStatus::new("RUNNING"), final_status]),
        );
        url
    }
}

#[async_trait]
impl TerminologyStore for FakeStore {
    async fn query_members(&self, query: &MemberQuery) -> MappingResult<Vec<RefsetMemberWire>> {
        let mut state = self.state.lock().expect("fake store lock");
        state.calls.push(Call::Query);
        Ok(state
            .members
            .values()
            .filter(|m| m.refset_id == query.refset_id)
            .filter(|m| m.referenced_component_id == query.referenced_component_id)
            .filter(|m| query.active.map_or(true, |active| m.active == active))
            .filter(|m| query.module_id.as_ref().map_or(true, |module| &m.module_id == module))
            .cloned()
            .collect())
    }

    async fn fetch_members(
        &self,
        _branch: &BranchPath,
        member_ids: &[String],
    ) -> MappingResult<Vec<RefsetMemberWire>> {
        let mut state = self.state.lock().expect("fake store lock");
        state.calls.push(Call::Fetch(member_ids.len()));
        Ok(member_ids
            .iter()
            .filter_map(|id| state.members.get(id).cloned())
            .collect())
    }

    async fn create_member(
        &self,
        _branch: &BranchPath,
        member: &RefsetMemberWire,
    ) -> MappingResult<RefsetMemberWire> {
        let mut state = self.state.lock().expect("fake store lock");
        state.calls.push(Call::Create);
        Ok(state.insert_new(member))
    }

    async fn update_member(
        &self,
        _branch: &BranchPath,
        member: &RefsetMemberWire,
    ) -> MappingResult<RefsetMemberWire> {
        let mut state = self.state.lock().expect("fake store lock");
        let id = member.member_id.clone().unwrap_or_default();
        state.calls.push(Call::Update(id.clone()));
        if state.fail_updates {
            return Err(FakeStore::remote_error(&format!("members/{id}"), 500, "Internal Server Error"));
        }
        state.apply_update(member)
    }

    async fn submit_bulk(
        &self,
        _branch: &BranchPath,
        members: &[RefsetMemberWire],
    ) -> MappingResult<String> {
        let mut state = self.state.lock().expect("fake store lock");
        state.calls.push(Call::Bulk(members.len()));
        if let Some(status) = state.fail_bulk_submit.take() {
            return Err(FakeStore::remote_error("members/bulk", status, "Bad Request"));
        }
        if let Some(message) = state.fail_bulk_job.take() {
            let failed = JobStatus {
                message: Some(message),
                ..JobStatus::new("FAILED")
            };
            return Ok(state.new_job("members/bulk", failed));
        }

        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            let stored = if member.member_id.is_some() {
                state.apply_update(member)?
            } else {
                state.insert_new(member)
            };
            ids.push(stored.member_id.unwrap_or_default());
        }
        if std::mem::take(&mut state.stall_bulk_job) {
            return Ok(state.new_job("members/bulk", JobStatus::new("RUNNING")));
        }
        let completed = JobStatus {
            member_ids: if state.omit_job_member_ids { Vec::new() } else { ids },
            ..JobStatus::new("COMPLETED")
        };
        Ok(state.new_job("members/bulk", completed))
    }

    async fn delete_members(&self, _branch: &BranchPath, member_ids: &[String]) -> MappingResult<()> {
        let mut state = self.state.lock().expect("fake store lock");
        state.calls.push(Call::Delete(member_ids.to_vec()));
        if member_ids
            .iter()
            .any(|id| state.members.get(id).is_some_and(|m| m.released))
        {
            return Err(FakeStore::remote_error("members", 409, "Conflict"));
        }
        for id in member_ids {
            state.members.remove(id);
        }
        Ok(())
    }

    async fn job_status(&self, job_url: &str) -> MappingResult<JobStatus> {
        let mut state = self.state.lock().expect("fake store lock");
        state.calls.push(Call::Status(job_url.to_string()));
        let Some(queue) = state.jobs.get_mut(job_url) else {
            return Err(FakeStore::remote_error(job_url, 404, "Not Found"));
        };
        let status = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(status)
    }

    async fn start_merge(&self, _request: &MergeRequest) -> MappingResult<String> {
        let mut state = self.state.lock().expect("fake store lock");
        state.calls.push(Call::Merge);
        Ok(state.new_job("merges", JobStatus::new("COMPLETED")))
    }
}

/// Resolver that knows a fixed set of names and counts its lookups.
#[derive(Default)]
pub struct FakeResolver {
    names: HashMap<String, String>,
    terminology: Option<String>,
    lookups: AtomicUsize,
}

impl FakeResolver {
    pub fn with(mut self, code: &str, name: &str) -> Self {
        self.names.insert(code.to_string(), name.to_string());
        self
    }

    /// Resolve codes of `terminology` only.
    pub fn only(mut self, terminology: &str) -> Self {
        self.terminology = Some(terminology.to_string());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConceptResolver for FakeResolver {
    fn resolves(&self, terminology: &str) -> bool {
        self.terminology
            .as_deref()
            .map_or(true, |only| only.eq_ignore_ascii_case(terminology))
    }

    async fn resolve_concept_name(
        &self,
        _terminology: &str,
        _version: &str,
        code: &str,
    ) -> MappingResult<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.names.get(code).cloned())
    }
}

/// Invalidator that counts invalidations per branch.
#[derive(Default)]
pub struct CountingInvalidator {
    counts: Mutex<HashMap<String, usize>>,
}

impl CountingInvalidator {
    pub fn count(&self, branch: &str) -> usize {
        self.counts
            .lock()
            .expect("invalidator lock")
            .get(branch)
            .copied()
            .unwrap_or(0)
    }
}

impl CacheInvalidator for CountingInvalidator {
    fn invalidate(&self, branch: &BranchPath) {
        *self
            .counts
            .lock()
            .expect("invalidator lock")
            .entry(branch.to_string())
            .or_insert(0) += 1;
    }
}
