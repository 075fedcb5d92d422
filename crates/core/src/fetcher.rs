//! Remote mapping snapshots.
//!
//! Reads the members that map one source code and translates them into [`Mapping`]s, going
//! through the [`MappingCache`] when one is attached.

use crate::cache::MappingCache;
use crate::model::{MapSet, Mapping};
use crate::store::{MemberQuery, TerminologyStore};
use crate::wire::wire_to_entry;
use crate::MappingResult;
use rms_types::BranchPath;
use std::sync::Arc;

#[derive(Clone)]
pub struct MappingFetcher {
    store: Arc<dyn TerminologyStore>,
    cache: Option<Arc<MappingCache>>,
}

impl MappingFetcher {
    pub fn new(store: Arc<dyn TerminologyStore>, cache: Option<Arc<MappingCache>>) -> Self {
        Self { store, cache }
    }

    /// Fetch the members mapping `code`, optionally restricted to one module and to active members.
    ///
    /// With `active_only` false, active and inactive members are both returned.
    pub async fn fetch_active_mapping(
        &self,
        branch: &BranchPath,
        map_set: &MapSet,
        code: &str,
        module_filter: Option<&str>,
        active_only: bool,
    ) -> MappingResult<Mapping> {
        let query = MemberQuery {
            branch: branch.clone(),
            refset_id: map_set.refset_code.to_string(),
            referenced_component_id: code.to_string(),
            active: active_only.then_some(true),
            module_id: module_filter.map(str::to_string),
        };
        self.fetch(&query).await
    }

    /// Fetch the inactive members of the local module: candidates for reactivation.
    pub async fn fetch_inactive_local_mapping(
        &self,
        branch: &BranchPath,
        map_set: &MapSet,
        code: &str,
        local_module_id: &str,
    ) -> MappingResult<Mapping> {
        let query = MemberQuery {
            branch: branch.clone(),
            refset_id: map_set.refset_code.to_string(),
            referenced_component_id: code.to_string(),
            active: Some(false),
            module_id: Some(local_module_id.to_string()),
        };
        self.fetch(&query).await
    }

    async fn fetch(&self, query: &MemberQuery) -> MappingResult<Mapping> {
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(query)) {
            tracing::debug!(code = %query.referenced_component_id, "mapping snapshot cache hit");
            return Ok(Mapping::new(query.referenced_component_id.clone(), cached));
        }

        let members = self.store.query_members(query).await?;
        let entries = members
            .iter()
            .map(wire_to_entry)
            .collect::<MappingResult<Vec<_>>>()?;
        if let Some(cache) = &self.cache {
            cache.put(query, entries.clone());
        }
        Ok(Mapping::new(query.referenced_component_id.clone(), entries))
    }
}
