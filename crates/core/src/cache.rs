//! Branch-scoped cache of remote mapping snapshots.
//!
//! Reads of the same source code repeat across planning, dry runs and the REST status calls. The
//! cache keeps the translated entries per query and drops everything for a branch as soon as the
//! executor reports a mutation on it.

use crate::model::MapEntry;
use crate::store::{CacheInvalidator, MemberQuery};
use rms_types::BranchPath;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SnapshotKey {
    branch: BranchPath,
    refset_id: String,
    code: String,
    active: Option<bool>,
    module_id: Option<String>,
}

impl From<&MemberQuery> for SnapshotKey {
    fn from(query: &MemberQuery) -> Self {
        Self {
            branch: query.branch.clone(),
            refset_id: query.refset_id.clone(),
            code: query.referenced_component_id.clone(),
            active: query.active,
            module_id: query.module_id.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MappingCache {
    entries: Mutex<HashMap<SnapshotKey, Vec<MapEntry>>>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, query: &MemberQuery) -> Option<Vec<MapEntry>> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(&SnapshotKey::from(query)).cloned()
    }

    pub fn put(&self, query: &MemberQuery, snapshot: Vec<MapEntry>) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(SnapshotKey::from(query), snapshot);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheInvalidator for MappingCache {
    fn invalidate(&self, branch: &BranchPath) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|key, _| &key.branch != branch);
        tracing::debug!(%branch, dropped = before - entries.len(), "invalidated mapping cache");
    }
}
