//! Domain model for map sets, mappings and map entries.
//!
//! These are the engine's own types. Remote wire payloads live in [`crate::wire`] and REST/CLI
//! DTOs in the `api-shared` crate; both translate into the types defined here.

use rms_types::NonEmptyText;
use std::collections::BTreeSet;

// ============================================================================
// MapSet
// ============================================================================

/// A mapping correspondence table between two code systems, stored remotely as one
/// extended-map reference set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapSet {
    /// Refset concept id of the map (the remote `refsetId`).
    pub refset_code: NonEmptyText,
    /// Module that owns locally-authored content for this map set.
    pub module_id: NonEmptyText,
    pub from_terminology: String,
    pub from_version: String,
    pub to_terminology: String,
    pub to_version: String,
}

impl MapSet {
    /// Returns true when this map set is owned by the given International module.
    pub fn is_international(&self, international_module_id: &str) -> bool {
        self.module_id.as_str() == international_module_id
    }
}

// ============================================================================
// MapEntry
// ============================================================================

/// One correspondence row: a target code plus the rule/priority/advice metadata that places it.
///
/// Entries with the same `group` are alternatives; `priority` orders them within the group.
/// `block` takes part in identity only. Whether two entries are "the same" is decided solely by
/// the relations in [`crate::identity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapEntry {
    /// Remote member id; `None` until the store has assigned one.
    pub member_id: Option<String>,
    pub active: bool,
    /// Published in a release: may be inactivated but never deleted.
    pub released: bool,
    pub module_id: String,
    pub group: i32,
    pub priority: i32,
    pub block: i32,
    pub rule: String,
    pub advices: BTreeSet<String>,
    /// Display name of the map category.
    pub relation: Option<String>,
    /// Map category concept id (`mapCategoryId`).
    pub relation_code: String,
    pub to_code: String,
    pub to_name: Option<String>,
}

impl MapEntry {
    /// A new, unsaved, active entry with an empty rule and no advices.
    pub fn new(group: i32, priority: i32, to_code: impl Into<String>) -> Self {
        Self {
            member_id: None,
            active: true,
            released: false,
            module_id: String::new(),
            group,
            priority,
            block: 0,
            rule: String::new(),
            advices: BTreeSet::new(),
            relation: None,
            relation_code: String::new(),
            to_code: to_code.into(),
            to_name: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advices.insert(advice.into());
        self
    }

    pub fn with_relation_code(mut self, relation_code: impl Into<String>) -> Self {
        self.relation_code = relation_code.into();
        self
    }

    pub fn with_block(mut self, block: i32) -> Self {
        self.block = block;
        self
    }

    pub fn owned_by(mut self, module_id: impl Into<String>) -> Self {
        self.module_id = module_id.into();
        self
    }

    pub fn with_member_id(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self
    }

    pub fn released(mut self, released: bool) -> Self {
        self.released = released;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// The (group, priority) slot used to pair submitted and existing entries.
    pub fn slot(&self) -> (i32, i32) {
        (self.group, self.priority)
    }

    /// Short human-readable label for logs and error messages.
    pub fn label(&self) -> String {
        match &self.member_id {
            Some(id) => format!("{}/{}:{} [{}]", self.group, self.priority, self.to_code, id),
            None => format!("{}/{}:{}", self.group, self.priority, self.to_code),
        }
    }
}

// ============================================================================
// Mapping
// ============================================================================

/// A source code and its ordered map entries within one map set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mapping {
    /// Source code; identity key of the mapping within its map set.
    pub code: String,
    pub name: Option<String>,
    pub descriptions: Vec<String>,
    pub entries: Vec<MapEntry>,
}

impl Mapping {
    pub fn new(code: impl Into<String>, entries: Vec<MapEntry>) -> Self {
        let mut mapping = Self {
            code: code.into(),
            entries,
            ..Self::default()
        };
        mapping.sort_entries();
        mapping
    }

    /// Sort entries into canonical (group, priority) order.
    pub fn sort_entries(&mut self) {
        sort_canonical(&mut self.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whole-mapping content equality: same code, same entry count, and every entry pairwise
    /// equivalent once both sides are in canonical order.
    pub fn is_content_equal(&self, other: &Mapping) -> bool {
        if self.code != other.code || self.entries.len() != other.entries.len() {
            return false;
        }
        let left = sorted_entries(&self.entries);
        let right = sorted_entries(&other.entries);
        left.iter()
            .zip(right.iter())
            .all(|(a, b)| a.is_equivalent_to(b))
    }

    /// True when every entry is owned by `module_id` (false for an empty mapping).
    pub fn is_owned_by(&self, module_id: &str) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.module_id == module_id)
    }
}

/// Canonical ordering: ascending (group, priority), then target code and rule so repeated slots
/// in ambiguous input still sort deterministically.
pub fn sort_canonical(entries: &mut [MapEntry]) {
    entries.sort_by(|a, b| {
        (a.group, a.priority, &a.to_code, &a.rule).cmp(&(b.group, b.priority, &b.to_code, &b.rule))
    });
}

/// Returns a canonically ordered copy of `entries`.
pub fn sorted_entries(entries: &[MapEntry]) -> Vec<MapEntry> {
    let mut sorted = entries.to_vec();
    sort_canonical(&mut sorted);
    sorted
}

/// Returns true if `entries` is already in canonical order.
pub fn is_canonical_order(entries: &[MapEntry]) -> bool {
    entries.windows(2).all(|w| w[0].slot() <= w[1].slot())
}
