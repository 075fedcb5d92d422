//! # Mapping service
//!
//! Entry point for reconciling submitted mappings against the terminology store. One
//! reconciliation:
//!
//! 1. takes the refset lock
//! 2. normalises the submission (inactive entries dropped, canonical order)
//! 3. reads the active, International and inactive-local snapshots of the source code
//! 4. plans the mutations with [`crate::planner::plan`]
//! 5. carries them out with the [`MutationExecutor`]
//! 6. folds the canonical records back into the returned mapping and fills in missing target names
//!
//! Reads go through a [`MappingCache`] that the executor and merger invalidate per branch.

use crate::cache::MappingCache;
use crate::config::CoreConfig;
use crate::executor::{ExecutionReport, MutationExecutor, MutationTarget};
use crate::fetcher::MappingFetcher;
use crate::locks::RefsetLocks;
use crate::merge::BranchMerger;
use crate::model::{MapEntry, MapSet, Mapping};
use crate::planner::{self, MutationPlan, PlanCase, PlanInput, PlanSummary};
use crate::poller::JobPoller;
use crate::precedence::resolve_active;
use crate::store::{ConceptResolver, JobStatus, TerminologyStore};
use crate::{MappingError, MappingResult};
use rms_types::BranchPath;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Result of reconciling one mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The mapping as now stored remotely, carrying member ids, owners and release flags.
    pub mapping: Mapping,
    pub case: PlanCase,
    pub summary: PlanSummary,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.summary.total() == 0
    }
}

/// Outcome for one source code of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub code: String,
    pub outcome: MappingResult<ReconcileOutcome>,
}

/// Per-code results of [`MappingService::reconcile_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub refset_code: String,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

/// Remote snapshots of one source code.
struct Snapshots {
    active: Mapping,
    international: Mapping,
    inactive_local: Mapping,
}

#[derive(Clone)]
pub struct MappingService {
    cfg: Arc<CoreConfig>,
    fetcher: MappingFetcher,
    executor: MutationExecutor,
    merger: BranchMerger,
    resolver: Option<Arc<dyn ConceptResolver>>,
    locks: RefsetLocks,
}

impl MappingService {
    /// Creates a new `MappingService`.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration resolved at startup.
    /// * `store` - The terminology store holding the map members.
    /// * `resolver` - Looks up target code names missing from submissions; `None` leaves them empty.
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn TerminologyStore>,
        resolver: Option<Arc<dyn ConceptResolver>>,
    ) -> Self {
        let cache = Arc::new(MappingCache::new());
        let poller = JobPoller::from_config(&cfg);
        Self {
            fetcher: MappingFetcher::new(store.clone(), Some(cache.clone())),
            executor: MutationExecutor::new(store.clone(), poller, cache.clone()),
            merger: BranchMerger::new(store, poller, cache),
            cfg,
            resolver,
            locks: RefsetLocks::new(),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// True while a reconciliation holds the lock of `refset_code`.
    pub fn is_updating(&self, refset_code: &str) -> bool {
        self.locks.is_updating(refset_code)
    }

    /// Reconcile `submitted` into `map_set` on the configured branch.
    ///
    /// # Returns
    ///
    /// The mapping as stored after the mutations, plus what was done.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidInput`] for an International-owned map set, a submission
    /// without a source code, or duplicate (group, priority) slots. Remote failures propagate
    /// unchanged; batches that completed before the failure stay applied.
    pub async fn reconcile(
        &self,
        map_set: &MapSet,
        submitted: Mapping,
    ) -> MappingResult<ReconcileOutcome> {
        self.ensure_local(map_set)?;
        let _guard = self.locks.acquire(map_set.refset_code.as_str()).await;
        self.reconcile_locked(map_set, submitted).await
    }

    /// Reconcile several mappings of one map set under a single lock acquisition.
    ///
    /// A failing code does not stop the rest; each code's result is reported separately.
    pub async fn reconcile_batch(
        &self,
        map_set: &MapSet,
        mappings: Vec<Mapping>,
    ) -> MappingResult<BatchReport> {
        self.ensure_local(map_set)?;
        let _guard = self.locks.acquire(map_set.refset_code.as_str()).await;

        let mut report = BatchReport {
            refset_code: map_set.refset_code.to_string(),
            items: Vec::with_capacity(mappings.len()),
        };
        for mapping in mappings {
            let code = mapping.code.clone();
            let outcome = self.reconcile_locked(map_set, mapping).await;
            if let Err(err) = &outcome {
                tracing::warn!(%code, error = %err, "mapping reconciliation failed");
            }
            report.items.push(BatchItem { code, outcome });
        }
        tracing::info!(
            refset = %report.refset_code,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch reconciliation finished"
        );
        Ok(report)
    }

    /// Plan a reconciliation without touching the store.
    pub async fn plan(&self, map_set: &MapSet, submitted: Mapping) -> MappingResult<MutationPlan> {
        self.ensure_local(map_set)?;
        let submitted = normalise(submitted)?;
        let snapshots = self.snapshots(map_set, &submitted.code).await?;
        self.plan_against(map_set, &submitted, &snapshots)
    }

    /// Merge `source` into `target`, dropping cached snapshots of `target` afterwards.
    pub async fn merge(
        &self,
        source: &BranchPath,
        target: &BranchPath,
        comment: &str,
    ) -> MappingResult<JobStatus> {
        self.merger.merge(source, target, comment).await
    }

    async fn reconcile_locked(
        &self,
        map_set: &MapSet,
        submitted: Mapping,
    ) -> MappingResult<ReconcileOutcome> {
        let submitted = normalise(submitted)?;
        let snapshots = self.snapshots(map_set, &submitted.code).await?;
        let plan = self.plan_against(map_set, &submitted, &snapshots)?;
        let summary = plan.summary();

        tracing::info!(
            refset = %map_set.refset_code,
            code = %submitted.code,
            case = ?plan.case,
            %summary,
            "reconciling mapping"
        );

        let report = if plan.is_noop() {
            ExecutionReport::default()
        } else {
            let target = MutationTarget {
                branch: self.cfg.branch(),
                map_set,
                source_code: &submitted.code,
                module_id: map_set.module_id.as_str(),
            };
            self.executor.execute(&target, &plan).await?
        };

        let mut mapping = fold_back(submitted, &report, &snapshots);
        self.fill_target_names(map_set, &mut mapping).await;
        mapping.sort_entries();

        Ok(ReconcileOutcome {
            mapping,
            case: plan.case,
            summary,
        })
    }

    fn ensure_local(&self, map_set: &MapSet) -> MappingResult<()> {
        if map_set.is_international(self.cfg.international_module_id().as_str()) {
            return Err(MappingError::InvalidInput(format!(
                "map set {} is owned by the International module and cannot be edited locally",
                map_set.refset_code
            )));
        }
        Ok(())
    }

    async fn snapshots(&self, map_set: &MapSet, code: &str) -> MappingResult<Snapshots> {
        let branch = self.cfg.branch();
        let international_module = self.cfg.international_module_id().as_str();

        let pool = self
            .fetcher
            .fetch_active_mapping(branch, map_set, code, None, true)
            .await?;
        let view = resolve_active(pool.entries, international_module);
        let active = Mapping::new(code, view.entries);

        let international = self
            .fetcher
            .fetch_active_mapping(branch, map_set, code, Some(international_module), true)
            .await?;
        let inactive_local = self
            .fetcher
            .fetch_inactive_local_mapping(branch, map_set, code, map_set.module_id.as_str())
            .await?;

        tracing::debug!(
            code,
            owner = ?view.owner,
            active = active.entries.len(),
            international = international.entries.len(),
            inactive_local = inactive_local.entries.len(),
            "read remote mapping snapshots"
        );
        Ok(Snapshots {
            active,
            international,
            inactive_local,
        })
    }

    fn plan_against(
        &self,
        map_set: &MapSet,
        submitted: &Mapping,
        snapshots: &Snapshots,
    ) -> MappingResult<MutationPlan> {
        planner::plan(&PlanInput {
            submitted,
            existing_active: &snapshots.active,
            existing_active_international: &snapshots.international,
            existing_inactive_local: &snapshots.inactive_local,
            local_module_id: map_set.module_id.as_str(),
            international_module_id: self.cfg.international_module_id().as_str(),
        })
    }

    /// Resolve target names the submission left empty. Lookup failures are logged and skipped:
    /// the mutations have already been applied by now.
    async fn fill_target_names(&self, map_set: &MapSet, mapping: &mut Mapping) {
        let Some(resolver) = &self.resolver else {
            return;
        };
        if !resolver.resolves(&map_set.to_terminology) {
            tracing::debug!(
                refset = %map_set.refset_code,
                terminology = %map_set.to_terminology,
                "target names not resolvable for map set terminology"
            );
            return;
        }
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        for entry in mapping.entries.iter_mut() {
            if entry.to_name.is_some() || entry.to_code.is_empty() {
                continue;
            }
            if let Some(name) = resolved.get(&entry.to_code) {
                entry.to_name = name.clone();
                continue;
            }
            let name = match resolver
                .resolve_concept_name(&map_set.to_terminology, &map_set.to_version, &entry.to_code)
                .await
            {
                Ok(name) => name,
                Err(err) => {
                    tracing::warn!(to_code = %entry.to_code, error = %err, "could not resolve target name");
                    None
                }
            };
            resolved.insert(entry.to_code.clone(), name.clone());
            entry.to_name = name;
        }
    }
}

/// Drop inactive entries and sort into canonical order.
fn normalise(mut submitted: Mapping) -> MappingResult<Mapping> {
    submitted.code = submitted.code.trim().to_string();
    if submitted.code.is_empty() {
        return Err(MappingError::InvalidInput(
            "mapping has no source code".into(),
        ));
    }
    submitted.entries.retain(|e| e.active);
    submitted.sort_entries();
    Ok(submitted)
}

/// Stamp each submitted entry with the remote record now standing for it.
///
/// Records written by the executor take precedence; entries left untouched are matched against
/// the snapshots read before planning, skipping every record the executor deleted or rewrote.
fn fold_back(submitted: Mapping, report: &ExecutionReport, snapshots: &Snapshots) -> Mapping {
    let written = report.created.iter().chain(report.updated.iter()).filter(|e| e.active);
    let written: Vec<&MapEntry> = written.collect();
    let touched: HashSet<&str> = report
        .deleted
        .iter()
        .map(String::as_str)
        .chain(report.updated.iter().filter_map(|e| e.member_id.as_deref()))
        .collect();

    let mut mapping = submitted;
    for entry in mapping.entries.iter_mut() {
        let record = written
            .iter()
            .copied()
            .find(|r| r.shares_identity_with(entry))
            .or_else(|| {
                snapshots
                    .active
                    .entries
                    .iter()
                    .chain(snapshots.international.entries.iter())
                    .filter(|r| r.member_id.as_deref().map_or(true, |id| !touched.contains(id)))
                    .find(|r| r.is_equivalent_to(entry))
            });
        if let Some(record) = record {
            entry.member_id = record.member_id.clone();
            entry.module_id = record.module_id.clone();
            entry.released = record.released;
            entry.active = record.active;
            if entry.to_name.is_none() {
                entry.to_name = record.to_name.clone();
            }
        }
    }
    mapping
}
