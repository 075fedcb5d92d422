//! In-memory terminology store for router tests. Bulk jobs and merges complete immediately.

use async_trait::async_trait;
use rms_core::store::{JobStatus, MemberQuery, MergeRequest, TerminologyStore};
use rms_core::wire::RefsetMemberWire;
use rms_core::{MappingError, MappingResult};
use rms_types::BranchPath;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    members: BTreeMap<String, RefsetMemberWire>,
    jobs: HashMap<String, JobStatus>,
    next_id: u64,
    fail_queries: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn members(&self) -> Vec<RefsetMemberWire> {
        self.state
            .lock()
            .expect("store lock")
            .members
            .values()
            .cloned()
            .collect()
    }

    pub fn fail_queries(&self) {
        self.state.lock().expect("store lock").fail_queries = true;
    }
}

impl State {
    fn store(&mut self, member: &RefsetMemberWire) -> RefsetMemberWire {
        let mut stored = member.clone();
        let id = match &member.member_id {
            Some(id) => id.clone(),
            None => {
                self.next_id += 1;
                format!("member-{}", self.next_id)
            }
        };
        stored.member_id = Some(id.clone());
        self.members.insert(id, stored.clone());
        stored
    }

    fn job(&mut self, url: String, status: JobStatus) -> String {
        self.jobs.insert(url.clone(), status);
        url
    }
}

#[async_trait]
impl TerminologyStore for MemoryStore {
    async fn query_members(&self, query: &MemberQuery) -> MappingResult<Vec<RefsetMemberWire>> {
        let state = self.state.lock().expect("store lock");
        if state.fail_queries {
            return Err(MappingError::RemoteCallFailed {
                url: "http://snowstorm.test/members".into(),
                status: 503,
                reason: "Service Unavailable".into(),
            });
        }
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
        let state = self.state.lock().expect("store lock");
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
        Ok(self.state.lock().expect("store lock").store(member))
    }

    async fn update_member(
        &self,
        _branch: &BranchPath,
        member: &RefsetMemberWire,
    ) -> MappingResult<RefsetMemberWire> {
        Ok(self.state.lock().expect("store lock").store(member))
    }

    async fn submit_bulk(
        &self,
        _branch: &BranchPath,
        members: &[RefsetMemberWire],
    ) -> MappingResult<String> {
        let mut state = self.state.lock().expect("store lock");
        let member_ids = members
            .iter()
            .filter_map(|m| state.store(m).member_id)
            .collect();
        let url = format!("jobs/{}", state.jobs.len() + 1);
        Ok(state.job(
            url,
            JobStatus {
                member_ids,
                ..JobStatus::new("COMPLETED")
            },
        ))
    }

    async fn delete_members(&self, _branch: &BranchPath, member_ids: &[String]) -> MappingResult<()> {
        let mut state = self.state.lock().expect("store lock");
        for id in member_ids {
            state.members.remove(id);
        }
        Ok(())
    }

    async fn job_status(&self, job_url: &str) -> MappingResult<JobStatus> {
        let state = self.state.lock().expect("store lock");
        state
            .jobs
            .get(job_url)
            .cloned()
            .ok_or_else(|| MappingError::RemoteCallFailed {
                url: job_url.to_string(),
                status: 404,
                reason: "Not Found".into(),
            })
    }

    async fn start_merge(&self, _request: &MergeRequest) -> MappingResult<String> {
        let mut state = self.state.lock().expect("store lock");
        let url = format!("merges/{}", state.jobs.len() + 1);
        Ok(state.job(url, JobStatus::new("COMPLETED")))
    }
}
