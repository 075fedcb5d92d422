//! Remote mutation executor.
//!
//! Carries out a [`MutationPlan`] against the terminology store. Batches run strictly in the
//! order delete, create, inactivate, reactivate, update, and never overlap: each bulk job is
//! polled to completion before the next batch starts. A batch of one item uses the synchronous
//! single-member call; larger batches go through a bulk job. Deletes always go through the
//! delete-by-id call.
//!
//! The executor is not transactional. If a batch fails, earlier batches stay applied remotely
//! and the error propagates; re-running the reconciliation converges because planning is
//! idempotent. Every mutating call invalidates the branch whether or not it succeeded, since a
//! timed-out job or a dropped connection may still have changed remote state.

use crate::model::{MapEntry, MapSet};
use crate::planner::MutationPlan;
use crate::poller::JobPoller;
use crate::store::{CacheInvalidator, MemberQuery, TerminologyStore};
use crate::wire::{entry_to_wire, wire_to_entry, RefsetMemberWire};
use crate::{MappingError, MappingResult};
use rms_types::BranchPath;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where the mutations of one reconciliation land.
#[derive(Clone, Copy, Debug)]
pub struct MutationTarget<'a> {
    pub branch: &'a BranchPath,
    pub map_set: &'a MapSet,
    pub source_code: &'a str,
    /// Module stamped on everything written.
    pub module_id: &'a str,
}

/// Canonical records returned by the store for everything the executor touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub created: Vec<MapEntry>,
    /// Updated, inactivated and reactivated records.
    pub updated: Vec<MapEntry>,
    pub deleted: Vec<String>,
}

impl ExecutionReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Clone)]
pub struct MutationExecutor {
    store: Arc<dyn TerminologyStore>,
    poller: JobPoller,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl MutationExecutor {
    pub fn new(
        store: Arc<dyn TerminologyStore>,
        poller: JobPoller,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            store,
            poller,
            invalidator,
        }
    }

    /// Run every batch of `plan` in order.
    ///
    /// # Errors
    ///
    /// Propagates the first failing batch. Batches that already ran are not undone.
    pub async fn execute(
        &self,
        target: &MutationTarget<'_>,
        plan: &MutationPlan,
    ) -> MappingResult<ExecutionReport> {
        let mut report = ExecutionReport::default();

        let delete_ids: Vec<String> = plan
            .delete
            .values()
            .filter_map(|e| {
                if e.member_id.is_none() {
                    tracing::warn!(entry = %e.label(), "skipping delete of entry without member id");
                }
                e.member_id.clone()
            })
            .collect();
        if !delete_ids.is_empty() {
            self.delete_bulk(target, &delete_ids).await?;
            report.deleted = delete_ids;
        }

        let creates: Vec<MapEntry> = plan.create.values().cloned().collect();
        report.created = self.run_batch("create", target, &creates, BatchKind::Create).await?;

        for (label, set) in [
            ("inactivate", &plan.inactivate),
            ("reactivate", &plan.reactivate),
            ("update", &plan.update),
        ] {
            let entries: Vec<MapEntry> = set.values().cloned().collect();
            let updated = self.run_batch(label, target, &entries, BatchKind::Update).await?;
            report.updated.extend(updated);
        }

        Ok(report)
    }

    /// Create one member synchronously.
    pub async fn create_single(
        &self,
        target: &MutationTarget<'_>,
        entry: &MapEntry,
    ) -> MappingResult<MapEntry> {
        let mut payload = self.payload(target, entry);
        payload.member_id = None;
        let stored = self.store.create_member(target.branch, &payload).await;
        self.invalidator.invalidate(target.branch);
        wire_to_entry(&stored?)
    }

    /// Create two or more members through a bulk job.
    pub async fn create_bulk(
        &self,
        target: &MutationTarget<'_>,
        entries: &[MapEntry],
    ) -> MappingResult<Vec<MapEntry>> {
        let payloads: Vec<RefsetMemberWire> = entries
            .iter()
            .map(|e| {
                let mut payload = self.payload(target, e);
                payload.member_id = None;
                payload
            })
            .collect();
        self.bulk(target, entries, &payloads).await
    }

    /// Update one existing member synchronously.
    pub async fn update_single(
        &self,
        target: &MutationTarget<'_>,
        entry: &MapEntry,
    ) -> MappingResult<MapEntry> {
        require_member_id(entry)?;
        let payload = self.payload(target, entry);
        let stored = self.store.update_member(target.branch, &payload).await;
        self.invalidator.invalidate(target.branch);
        wire_to_entry(&stored?)
    }

    /// Update two or more existing members through a bulk job.
    pub async fn update_bulk(
        &self,
        target: &MutationTarget<'_>,
        entries: &[MapEntry],
    ) -> MappingResult<Vec<MapEntry>> {
        for entry in entries {
            require_member_id(entry)?;
        }
        let payloads: Vec<RefsetMemberWire> =
            entries.iter().map(|e| self.payload(target, e)).collect();
        self.bulk(target, entries, &payloads).await
    }

    /// Delete members by id in a single call.
    pub async fn delete_bulk(
        &self,
        target: &MutationTarget<'_>,
        member_ids: &[String],
    ) -> MappingResult<()> {
        tracing::info!(
            code = target.source_code,
            count = member_ids.len(),
            "deleting unreleased map members"
        );
        let deleted = self.store.delete_members(target.branch, member_ids).await;
        self.invalidator.invalidate(target.branch);
        deleted
    }

    async fn run_batch(
        &self,
        label: &str,
        target: &MutationTarget<'_>,
        entries: &[MapEntry],
        kind: BatchKind,
    ) -> MappingResult<Vec<MapEntry>> {
        match (entries.len(), kind) {
            (0, _) => Ok(Vec::new()),
            (1, BatchKind::Create) => {
                tracing::info!(code = target.source_code, batch = label, "single create");
                Ok(vec![self.create_single(target, &entries[0]).await?])
            }
            (1, BatchKind::Update) => {
                tracing::info!(code = target.source_code, batch = label, "single update");
                Ok(vec![self.update_single(target, &entries[0]).await?])
            }
            (count, BatchKind::Create) => {
                tracing::info!(code = target.source_code, batch = label, count, "bulk create");
                self.create_bulk(target, entries).await
            }
            (count, BatchKind::Update) => {
                tracing::info!(code = target.source_code, batch = label, count, "bulk update");
                self.update_bulk(target, entries).await
            }
        }
    }

    async fn bulk(
        &self,
        target: &MutationTarget<'_>,
        entries: &[MapEntry],
        payloads: &[RefsetMemberWire],
    ) -> MappingResult<Vec<MapEntry>> {
        let status = match self.store.submit_bulk(target.branch, payloads).await {
            Ok(job_url) => self.poller.wait(self.store.as_ref(), &job_url).await,
            Err(err) => Err(err),
        };
        self.invalidator.invalidate(target.branch);
        let status = status?;

        let stored = if status.member_ids.is_empty() {
            self.reread(target, entries).await?
        } else {
            self.store
                .fetch_members(target.branch, &status.member_ids)
                .await?
        };
        stored.iter().map(wire_to_entry).collect()
    }

    /// Recover canonical records when a job does not report member ids: read the source code's
    /// members back and keep those matching what was sent in identity and active flag.
    async fn reread(
        &self,
        target: &MutationTarget<'_>,
        entries: &[MapEntry],
    ) -> MappingResult<Vec<RefsetMemberWire>> {
        let members = self
            .store
            .query_members(&MemberQuery {
                branch: target.branch.clone(),
                refset_id: target.map_set.refset_code.to_string(),
                referenced_component_id: target.source_code.to_string(),
                active: None,
                module_id: Some(target.module_id.to_string()),
            })
            .await?;

        let mut by_identity = BTreeMap::new();
        for member in members {
            let entry = wire_to_entry(&member)?;
            let wanted = entries
                .iter()
                .find(|e| e.shares_identity_with(&entry) && e.active == entry.active);
            if wanted.is_some() {
                by_identity.entry(entry.identity_key()).or_insert(member);
            }
        }
        Ok(by_identity.into_values().collect())
    }

    fn payload(&self, target: &MutationTarget<'_>, entry: &MapEntry) -> RefsetMemberWire {
        entry_to_wire(entry, target.map_set, target.source_code, target.module_id)
    }
}

#[derive(Clone, Copy, Debug)]
enum BatchKind {
    Create,
    Update,
}

fn require_member_id(entry: &MapEntry) -> MappingResult<()> {
    match entry.member_id.as_deref() {
        Some(id) if !id.is_empty() => Ok(()),
        _ => Err(MappingError::InvalidInput(format!(
            "cannot update {} without a member id",
            entry.label()
        ))),
    }
}
