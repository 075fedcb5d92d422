//! Entry identity and equivalence.
//!
//! Two relations classify every change the engine makes:
//!
//! - **Equivalence**: same observable content. Group, priority, block, advices (as a set),
//!   relation code, rule and target code all match. Module owner, member id and release state
//!   are ignored.
//! - **Identity**: same remote slot, so the record may be updated in place. Equivalence minus
//!   advices and relation code.
//!
//! Equivalent entries always share identity; entries sharing identity may differ in content,
//! which is the update case. Both relations are materialised as ordered keys so that sets of
//! entries can be deduplicated in `BTreeMap`s instead of by object identity.

use crate::model::MapEntry;
use crate::{MappingError, MappingResult};
use std::collections::BTreeSet;

/// The fields that decide whether two entries occupy the same remote slot.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey {
    pub group: i32,
    pub priority: i32,
    pub block: i32,
    pub rule: String,
    pub to_code: String,
}

/// The fields that decide whether two entries have the same content.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EquivalenceKey {
    pub identity: IdentityKey,
    pub advices: BTreeSet<String>,
    pub relation_code: String,
}

impl MapEntry {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            group: self.group,
            priority: self.priority,
            block: self.block,
            rule: self.rule.clone(),
            to_code: self.to_code.clone(),
        }
    }

    pub fn equivalence_key(&self) -> EquivalenceKey {
        EquivalenceKey {
            identity: self.identity_key(),
            advices: self.advices.clone(),
            relation_code: self.relation_code.clone(),
        }
    }

    pub fn is_equivalent_to(&self, other: &MapEntry) -> bool {
        self.shares_identity_with(other)
            && self.advices == other.advices
            && self.relation_code == other.relation_code
    }

    pub fn shares_identity_with(&self, other: &MapEntry) -> bool {
        self.group == other.group
            && self.priority == other.priority
            && self.block == other.block
            && self.rule == other.rule
            && self.to_code == other.to_code
    }

    /// Copy the non-identity content of `submitted` onto this (existing) record.
    ///
    /// Member id, module, active and released flags are left alone; the caller decides those.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::IdentityViolation`] if the two entries do not share identity.
    /// The planner only pairs identity-sharing entries, so this indicates a programming error.
    pub fn copy_content_from(&mut self, submitted: &MapEntry) -> MappingResult<()> {
        if !self.shares_identity_with(submitted) {
            return Err(MappingError::IdentityViolation {
                existing: self.label(),
                submitted: submitted.label(),
            });
        }
        self.advices = submitted.advices.clone();
        self.relation = submitted.relation.clone();
        self.relation_code = submitted.relation_code.clone();
        if submitted.to_name.is_some() {
            self.to_name = submitted.to_name.clone();
        }
        Ok(())
    }
}

/// Content equality over optional entries. Both absent compare equal; one absent does not.
pub fn equivalent(a: Option<&MapEntry>, b: Option<&MapEntry>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is_equivalent_to(b),
        _ => false,
    }
}

/// Slot identity over optional entries. Both absent compare equal; one absent does not.
pub fn shares_identity(a: Option<&MapEntry>, b: Option<&MapEntry>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.shares_identity_with(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x40() -> MapEntry {
        MapEntry::new(1, 1, "X40")
            .with_rule("TRUE")
            .with_advice("ALWAYS X40")
            .with_relation_code("447637006")
    }

    #[test]
    fn null_handling_is_total() {
        let entry = x40();
        assert!(equivalent(None, None));
        assert!(shares_identity(None, None));
        assert!(!equivalent(Some(&entry), None));
        assert!(!equivalent(None, Some(&entry)));
        assert!(!shares_identity(Some(&entry), None));
        assert!(!shares_identity(None, Some(&entry)));
    }

    #[test]
    fn equivalence_ignores_module_member_id_and_release() {
        let a = x40().owned_by("900000000000207008");
        let b = x40().owned_by("51000202101");
        assert!(equivalent(Some(&a), Some(&b)));

        let c = x40().with_member_id("c9a3b7f2-0000").released(true).active(false);
        assert!(equivalent(Some(&a), Some(&c)));
    }

    #[test]
    fn equivalence_treats_advices_as_a_set() {
        let a = x40().with_advice("MAP IS CONTEXT DEPENDENT");
        let b = MapEntry::new(1, 1, "X40")
            .with_rule("TRUE")
            .with_advice("MAP IS CONTEXT DEPENDENT")
            .with_advice("ALWAYS X40")
            .with_relation_code("447637006");
        assert!(a.is_equivalent_to(&b));
        assert_eq!(a.equivalence_key(), b.equivalence_key());
    }

    #[test]
    fn identity_is_coarser_than_equivalence() {
        let a = x40();
        let b = x40().with_advice("POSSIBLE REQUIREMENT FOR ADDITIONAL CODE");
        assert!(!equivalent(Some(&a), Some(&b)));
        assert!(shares_identity(Some(&a), Some(&b)));

        let c = x40().with_relation_code("447639009");
        assert!(!a.is_equivalent_to(&c));
        assert!(a.shares_identity_with(&c));
        assert_eq!(a.identity_key(), c.identity_key());
    }

    #[test]
    fn identity_covers_target_rule_and_block() {
        let a = x40();
        assert!(!a.shares_identity_with(&MapEntry::new(1, 1, "X41").with_rule("TRUE")));
        assert!(!a.shares_identity_with(&x40().with_rule("OTHERWISE TRUE")));
        assert!(!a.shares_identity_with(&x40().with_block(2)));
        assert!(!a.shares_identity_with(&MapEntry::new(1, 2, "X40").with_rule("TRUE")));
    }

    #[test]
    fn copy_content_requires_identity() {
        let mut existing = x40().with_member_id("m1").released(true);
        let submitted = x40().with_advice("ADDITIONAL").with_relation_code("447639009");
        existing
            .copy_content_from(&submitted)
            .expect("identity-sharing entries should copy");
        assert_eq!(existing.member_id.as_deref(), Some("m1"));
        assert!(existing.released);
        assert!(existing.is_equivalent_to(&submitted));

        let other = MapEntry::new(1, 1, "X41").with_rule("TRUE");
        let err = existing
            .copy_content_from(&other)
            .expect_err("different target must be rejected");
        assert!(matches!(err, MappingError::IdentityViolation { .. }));
    }
}
