//! Terminology store wire models and translation helpers.
//!
//! Responsibilities:
//! - Define the JSON shape of an extended-map reference set member as the store exchanges it
//! - Translate between [`MapEntry`] and that shape
//!
//! Notes:
//! - `additionalFields` values are strings on the wire, including group and priority
//! - Anything written through this path is unreleased, carries an empty effective time and
//!   the fixed map correlation id

use crate::constants::{MAP_ADVICE_SEPARATOR, MAP_CORRELATION_ID};
use crate::model::{MapEntry, MapSet};
use crate::{MappingError, MappingResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Wire types
// ============================================================================

/// One reference set member as sent to and received from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefsetMemberWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    pub active: bool,
    pub module_id: String,
    #[serde(default)]
    pub released: bool,
    pub refset_id: String,
    pub referenced_component_id: String,
    #[serde(default)]
    pub additional_fields: MapAdditionalFields,
    #[serde(default)]
    pub effective_time: Option<String>,
}

/// Extended map columns carried in `additionalFields`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapAdditionalFields {
    #[serde(default)]
    pub map_category_id: String,
    #[serde(default)]
    pub map_rule: String,
    #[serde(default)]
    pub map_advice: String,
    #[serde(default)]
    pub map_priority: String,
    #[serde(default)]
    pub map_group: String,
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub map_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_block: Option<String>,
}

/// A page of members returned by member queries.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MemberPage {
    #[serde(default)]
    pub items: Vec<RefsetMemberWire>,
    #[serde(default)]
    pub total: Option<u64>,
}

// ============================================================================
// Translation
// ============================================================================

/// Build the payload that creates or updates `entry` for `source_code` in `map_set`.
///
/// `module_id` is the submitter's module: records written through this path are always owned by
/// it, unreleased and carry an empty effective time.
pub fn entry_to_wire(
    entry: &MapEntry,
    map_set: &MapSet,
    source_code: &str,
    module_id: &str,
) -> RefsetMemberWire {
    RefsetMemberWire {
        member_id: entry.member_id.clone().filter(|id| !id.is_empty()),
        active: entry.active,
        module_id: module_id.to_string(),
        released: false,
        refset_id: map_set.refset_code.to_string(),
        referenced_component_id: source_code.to_string(),
        additional_fields: MapAdditionalFields {
            map_category_id: entry.relation_code.clone(),
            map_rule: entry.rule.clone(),
            map_advice: join_advices(&entry.advices),
            map_priority: entry.priority.to_string(),
            map_group: entry.group.to_string(),
            correlation_id: MAP_CORRELATION_ID.to_string(),
            map_target: entry.to_code.clone(),
            map_block: (entry.block != 0).then(|| entry.block.to_string()),
        },
        effective_time: Some(String::new()),
    }
}

/// Translate a member read from the store into a [`MapEntry`].
///
/// # Errors
///
/// Returns [`MappingError::InvalidInput`] if group, priority or block are not integers.
pub fn wire_to_entry(wire: &RefsetMemberWire) -> MappingResult<MapEntry> {
    let fields = &wire.additional_fields;
    Ok(MapEntry {
        member_id: wire.member_id.clone(),
        active: wire.active,
        released: wire.released,
        module_id: wire.module_id.clone(),
        group: parse_int("mapGroup", &fields.map_group, wire)?,
        priority: parse_int("mapPriority", &fields.map_priority, wire)?,
        block: match &fields.map_block {
            Some(block) if !block.trim().is_empty() => parse_int("mapBlock", block, wire)?,
            _ => 0,
        },
        rule: fields.map_rule.clone(),
        advices: split_advices(&fields.map_advice),
        relation: None,
        relation_code: fields.map_category_id.clone(),
        to_code: fields.map_target.clone(),
        to_name: None,
    })
}

pub fn join_advices(advices: &BTreeSet<String>) -> String {
    advices
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(MAP_ADVICE_SEPARATOR)
}

pub fn split_advices(raw: &str) -> BTreeSet<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_int(field: &str, value: &str, wire: &RefsetMemberWire) -> MappingResult<i32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse::<i32>().map_err(|_| {
        MappingError::InvalidInput(format!(
            "member {} has non-numeric {field} '{value}'",
            wire.member_id.as_deref().unwrap_or("<new>")
        ))
    })
}
