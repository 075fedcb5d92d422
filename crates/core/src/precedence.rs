//! Edition precedence.
//!
//! A source code may have map entries owned by the International module and by a local edition
//! module at the same time. Local content, when present, replaces International content
//! entirely; otherwise International content is what is in effect.

use crate::model::{sort_canonical, MapEntry};

/// Which owner's entries are in effect for a source code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    Local,
    International,
    /// Neither owner has entries.
    None,
}

/// The entries currently in effect, in canonical order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveView {
    pub owner: Owner,
    pub entries: Vec<MapEntry>,
}

/// Partition `entries` by owner and select the active subset.
///
/// Entries owned by `international_module_id` form the International subset; everything else is
/// local. The local subset wins whenever it is non-empty.
pub fn resolve_active(entries: Vec<MapEntry>, international_module_id: &str) -> ActiveView {
    let (mut international, mut local): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.module_id == international_module_id);

    if !local.is_empty() {
        sort_canonical(&mut local);
        return ActiveView {
            owner: Owner::Local,
            entries: local,
        };
    }
    if !international.is_empty() {
        sort_canonical(&mut international);
        return ActiveView {
            owner: Owner::International,
            entries: international,
        };
    }
    ActiveView {
        owner: Owner::None,
        entries: Vec::new(),
    }
}
