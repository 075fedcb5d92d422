//! Mapping diff planner.
//!
//! Given a submitted mapping and up to three remote snapshots, the planner decides which remote
//! records to create, delete, inactivate, reactivate or update so that the remote state converges
//! on the submission. It performs no I/O; [`crate::executor`] carries the plan out.
//!
//! Planning runs in two passes:
//!
//! 1. **Classification** into a [`ChangeSet`] of entries to add, entries to remove and
//!    (existing, submitted) pairs to modify. The first matching case wins:
//!    - submission already in effect locally: nothing to do;
//!    - nothing in effect remotely, or only International content in effect: add everything;
//!    - submission equals the International content: remove the local override;
//!    - otherwise pair entries by (group, priority) and compare them.
//! 2. **Materialisation** of the change set into the five remote operation kinds, honouring
//!    release immutability (released records are inactivated, never deleted) and reusing
//!    inactive local records where one shares identity with an added entry.

use crate::identity::IdentityKey;
use crate::model::{MapEntry, Mapping};
use crate::{MappingError, MappingResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Everything the planner looks at for one source code.
#[derive(Clone, Copy, Debug)]
pub struct PlanInput<'a> {
    pub submitted: &'a Mapping,
    /// The remote mapping currently in effect (local if any local entries exist, else International).
    pub existing_active: &'a Mapping,
    /// Active remote entries owned by the International module.
    pub existing_active_international: &'a Mapping,
    /// Inactive remote entries owned by the local module: reactivation candidates.
    pub existing_inactive_local: &'a Mapping,
    pub local_module_id: &'a str,
    pub international_module_id: &'a str,
}

/// Which classification case produced a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanCase {
    /// The submission is already the local mapping in effect.
    Unchanged,
    /// Nothing is in effect remotely.
    NoExistingEntries,
    /// International content is in effect; the submission becomes a local override.
    OverrideInternational,
    /// The submission equals International content; the local override is withdrawn.
    RevertToInternational,
    /// Entry-by-entry reconciliation against the local mapping in effect.
    Reconcile,
}

impl PlanCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCase::Unchanged => "unchanged",
            PlanCase::NoExistingEntries => "no_existing_entries",
            PlanCase::OverrideInternational => "override_international",
            PlanCase::RevertToInternational => "revert_to_international",
            PlanCase::Reconcile => "reconcile",
        }
    }
}

impl fmt::Display for PlanCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First-pass classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub add: Vec<MapEntry>,
    pub remove: Vec<MapEntry>,
    /// (existing, submitted) pairs that share identity but differ in content.
    pub modify: Vec<(MapEntry, MapEntry)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.modify.is_empty()
    }
}

/// Key of one planned operation. Existing remote records are keyed by member id, so two remote
/// records sharing an identity stay distinct; records still to be created are keyed by identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanKey {
    Member(String),
    New(IdentityKey),
}

impl PlanKey {
    pub fn of(record: &MapEntry) -> Self {
        match &record.member_id {
            Some(id) => PlanKey::Member(id.clone()),
            None => PlanKey::New(record.identity_key()),
        }
    }
}

/// Concrete remote operations; each remote record is touched at most once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationPlan {
    pub case: PlanCase,
    pub changes: ChangeSet,
    pub create: BTreeMap<PlanKey, MapEntry>,
    pub delete: BTreeMap<PlanKey, MapEntry>,
    pub inactivate: BTreeMap<PlanKey, MapEntry>,
    pub reactivate: BTreeMap<PlanKey, MapEntry>,
    pub update: BTreeMap<PlanKey, MapEntry>,
}

/// Operation counts of a plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub inactivate: usize,
    pub reactivate: usize,
    pub update: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.create + self.delete + self.inactivate + self.reactivate + self.update
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "create={} delete={} inactivate={} reactivate={} update={}",
            self.create, self.delete, self.inactivate, self.reactivate, self.update
        )
    }
}

impl MutationPlan {
    fn empty(case: PlanCase) -> Self {
        Self {
            case,
            changes: ChangeSet::default(),
            create: BTreeMap::new(),
            delete: BTreeMap::new(),
            inactivate: BTreeMap::new(),
            reactivate: BTreeMap::new(),
            update: BTreeMap::new(),
        }
    }

    /// True when carrying out the plan would not touch the remote store.
    pub fn is_noop(&self) -> bool {
        self.summary().total() == 0
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.create.len(),
            delete: self.delete.len(),
            inactivate: self.inactivate.len(),
            reactivate: self.reactivate.len(),
            update: self.update.len(),
        }
    }
}

/// Plan the remote mutations for one submitted mapping.
///
/// # Errors
///
/// Returns [`MappingError::InvalidInput`] if two submitted entries share a (group, priority)
/// slot, which is ambiguous and never resolved automatically. Returns
/// [`MappingError::IdentityViolation`] only if classification paired entries that do not share
/// identity, which would be a bug in this module.
pub fn plan(input: &PlanInput<'_>) -> MappingResult<MutationPlan> {
    reject_duplicate_slots(input.submitted)?;

    let (case, changes) = classify(input);
    let mut plan = MutationPlan::empty(case);
    if changes.is_empty() {
        return Ok(plan);
    }

    materialise(input, &changes, &mut plan)?;
    plan.changes = changes;

    tracing::debug!(
        code = %input.submitted.code,
        case = ?plan.case,
        summary = %plan.summary(),
        "planned mapping reconciliation"
    );
    Ok(plan)
}

fn reject_duplicate_slots(submitted: &Mapping) -> MappingResult<()> {
    let mut seen = BTreeSet::new();
    for entry in &submitted.entries {
        if !seen.insert(entry.slot()) {
            return Err(MappingError::InvalidInput(format!(
                "mapping {} has more than one entry at group {} priority {}",
                submitted.code, entry.group, entry.priority
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Pass 1: classification
// ============================================================================

fn classify(input: &PlanInput<'_>) -> (PlanCase, ChangeSet) {
    let submitted = input.submitted;
    let existing = input.existing_active;
    let existing_is_international = existing.is_owned_by(input.international_module_id);

    if !existing_is_international && submitted.is_content_equal(existing) {
        return (PlanCase::Unchanged, ChangeSet::default());
    }

    if existing.is_empty() {
        return (
            PlanCase::NoExistingEntries,
            ChangeSet {
                add: submitted.entries.clone(),
                ..ChangeSet::default()
            },
        );
    }

    if existing_is_international {
        return (
            PlanCase::OverrideInternational,
            ChangeSet {
                add: submitted.entries.clone(),
                ..ChangeSet::default()
            },
        );
    }

    if submitted.is_content_equal(input.existing_active_international) {
        return (
            PlanCase::RevertToInternational,
            ChangeSet {
                remove: existing.entries.clone(),
                ..ChangeSet::default()
            },
        );
    }

    (PlanCase::Reconcile, pair_by_slot(submitted, existing))
}

fn pair_by_slot(submitted: &Mapping, existing: &Mapping) -> ChangeSet {
    let by_slot: BTreeMap<(i32, i32), &MapEntry> =
        submitted.entries.iter().map(|e| (e.slot(), e)).collect();
    let mut existing_by_slot: BTreeMap<(i32, i32), Vec<&MapEntry>> = BTreeMap::new();
    for current in &existing.entries {
        existing_by_slot.entry(current.slot()).or_default().push(current);
    }

    let mut changes = ChangeSet::default();
    for (slot, records) in &existing_by_slot {
        let Some(wanted) = by_slot.get(slot) else {
            changes.remove.extend(records.iter().map(|r| (*r).clone()));
            continue;
        };

        // One record may stand for the slot; any other record there is a duplicate to remove.
        let keep = records
            .iter()
            .position(|r| r.is_equivalent_to(wanted))
            .or_else(|| records.iter().position(|r| r.shares_identity_with(wanted)));
        for (index, current) in records.iter().enumerate() {
            if Some(index) != keep {
                changes.remove.push((*current).clone());
            }
        }

        match keep.map(|index| records[index]) {
            Some(current) if current.is_equivalent_to(wanted) => {}
            Some(current) => changes.modify.push((current.clone(), (*wanted).clone())),
            None => changes.add.push((*wanted).clone()),
        }
    }

    changes.add.extend(
        submitted
            .entries
            .iter()
            .filter(|e| !existing_by_slot.contains_key(&e.slot()))
            .cloned(),
    );
    changes
}

// ============================================================================
// Pass 2: materialisation
// ============================================================================

fn materialise(
    input: &PlanInput<'_>,
    changes: &ChangeSet,
    plan: &mut MutationPlan,
) -> MappingResult<()> {
    let local = input.local_module_id;
    let mut inactive_pool: Vec<MapEntry> = input
        .existing_inactive_local
        .entries
        .iter()
        .filter(|e| !e.active && e.member_id.is_some())
        .cloned()
        .collect();

    for wanted in &changes.add {
        match take_reactivation_candidate(&mut inactive_pool, wanted) {
            Some(mut record) => {
                if !record.is_equivalent_to(wanted) {
                    record.copy_content_from(wanted)?;
                }
                record.active = true;
                record.module_id = local.to_string();
                plan.reactivate.insert(PlanKey::of(&record), record);
            }
            None => {
                let record = new_local_record(wanted, local);
                plan.create.insert(PlanKey::of(&record), record);
            }
        }
    }

    for current in &changes.remove {
        let mut record = current.clone();
        if record.released {
            record.active = false;
            plan.inactivate.insert(PlanKey::of(&record), record);
        } else {
            plan.delete.insert(PlanKey::of(&record), record);
        }
    }

    for (current, wanted) in &changes.modify {
        if current.released {
            let mut record = current.clone();
            record.copy_content_from(wanted)?;
            record.active = true;
            record.module_id = local.to_string();
            plan.update.insert(PlanKey::of(&record), record);
        } else {
            plan.delete.insert(PlanKey::of(current), current.clone());
            let record = new_local_record(wanted, local);
            plan.create.insert(PlanKey::of(&record), record);
        }
    }

    Ok(())
}

/// Remove and return the inactive record best matching `wanted`: an equivalent one if present,
/// otherwise the first sharing identity.
fn take_reactivation_candidate(pool: &mut Vec<MapEntry>, wanted: &MapEntry) -> Option<MapEntry> {
    let index = pool
        .iter()
        .position(|e| e.is_equivalent_to(wanted))
        .or_else(|| pool.iter().position(|e| e.shares_identity_with(wanted)))?;
    Some(pool.swap_remove(index))
}

fn new_local_record(wanted: &MapEntry, local_module_id: &str) -> MapEntry {
    MapEntry {
        member_id: None,
        active: true,
        released: false,
        module_id: local_module_id.to_string(),
        ..wanted.clone()
    }
}
