//! Request and response bodies of the REST API, with conversions to and from the engine types.

use crate::ApiError;
use rms_core::planner::{MutationPlan, PlanSummary};
use rms_core::{BatchReport, MapEntry, MapSet, Mapping, ReconcileOutcome};
use rms_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_true() -> bool {
    true
}

// ============================================================================
// Mapping model
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MapEntryDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub module_id: String,
    pub group: i32,
    pub priority: i32,
    #[serde(default)]
    pub block: i32,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub advices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default)]
    pub relation_code: String,
    pub to_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_name: Option<String>,
}

impl From<MapEntryDto> for MapEntry {
    fn from(dto: MapEntryDto) -> Self {
        MapEntry {
            member_id: dto.member_id.filter(|id| !id.is_empty()),
            active: dto.active,
            released: dto.released,
            module_id: dto.module_id,
            group: dto.group,
            priority: dto.priority,
            block: dto.block,
            rule: dto.rule,
            advices: dto
                .advices
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            relation: dto.relation,
            relation_code: dto.relation_code,
            to_code: dto.to_code,
            to_name: dto.to_name,
        }
    }
}

impl From<&MapEntry> for MapEntryDto {
    fn from(entry: &MapEntry) -> Self {
        MapEntryDto {
            member_id: entry.member_id.clone(),
            active: entry.active,
            released: entry.released,
            module_id: entry.module_id.clone(),
            group: entry.group,
            priority: entry.priority,
            block: entry.block,
            rule: entry.rule.clone(),
            advices: entry.advices.iter().cloned().collect(),
            relation: entry.relation.clone(),
            relation_code: entry.relation_code.clone(),
            to_code: entry.to_code.clone(),
            to_name: entry.to_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MappingDto {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default)]
    pub entries: Vec<MapEntryDto>,
}

impl From<MappingDto> for Mapping {
    fn from(dto: MappingDto) -> Self {
        let mut mapping = Mapping::new(dto.code, dto.entries.into_iter().map(MapEntry::from).collect());
        mapping.name = dto.name;
        mapping.descriptions = dto.descriptions;
        mapping
    }
}

impl From<&Mapping> for MappingDto {
    fn from(mapping: &Mapping) -> Self {
        MappingDto {
            code: mapping.code.clone(),
            name: mapping.name.clone(),
            descriptions: mapping.descriptions.clone(),
            entries: mapping.entries.iter().map(MapEntryDto::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MapSetDto {
    pub refset_code: String,
    /// Authoring module; the configured module is used when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default)]
    pub from_terminology: String,
    #[serde(default)]
    pub from_version: String,
    #[serde(default)]
    pub to_terminology: String,
    #[serde(default)]
    pub to_version: String,
}

impl MapSetDto {
    /// Build the engine's map set, falling back to `default_module` for the authoring module.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] if the refset code or module is blank.
    pub fn into_map_set(self, default_module: &str) -> Result<MapSet, ApiError> {
        let refset_code = NonEmptyText::new(self.refset_code)
            .map_err(|_| ApiError::BadRequest("map set refset_code is required".into()))?;
        let module = self
            .module_id
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_module.to_string());
        let module_id = NonEmptyText::new(module)
            .map_err(|_| ApiError::BadRequest("map set module_id is required".into()))?;
        Ok(MapSet {
            refset_code,
            module_id,
            from_terminology: self.from_terminology,
            from_version: self.from_version,
            to_terminology: self.to_terminology,
            to_version: self.to_version,
        })
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileReq {
    pub map_set: MapSetDto,
    pub mapping: MappingDto,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchReconcileReq {
    pub map_set: MapSetDto,
    pub mappings: Vec<MappingDto>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MergeReq {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlanSummaryDto {
    pub create: usize,
    pub delete: usize,
    pub inactivate: usize,
    pub reactivate: usize,
    pub update: usize,
}

impl From<PlanSummary> for PlanSummaryDto {
    fn from(summary: PlanSummary) -> Self {
        PlanSummaryDto {
            create: summary.create,
            delete: summary.delete,
            inactivate: summary.inactivate,
            reactivate: summary.reactivate,
            update: summary.update,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanRes {
    pub case: String,
    pub summary: PlanSummaryDto,
    pub create: Vec<MapEntryDto>,
    pub delete: Vec<MapEntryDto>,
    pub inactivate: Vec<MapEntryDto>,
    pub reactivate: Vec<MapEntryDto>,
    pub update: Vec<MapEntryDto>,
}

impl From<&MutationPlan> for PlanRes {
    fn from(plan: &MutationPlan) -> Self {
        let entries = |set: &std::collections::BTreeMap<_, MapEntry>| {
            set.values().map(MapEntryDto::from).collect::<Vec<_>>()
        };
        PlanRes {
            case: plan.case.to_string(),
            summary: plan.summary().into(),
            create: entries(&plan.create),
            delete: entries(&plan.delete),
            inactivate: entries(&plan.inactivate),
            reactivate: entries(&plan.reactivate),
            update: entries(&plan.update),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileRes {
    pub mapping: MappingDto,
    pub case: String,
    pub summary: PlanSummaryDto,
    pub noop: bool,
}

impl From<&ReconcileOutcome> for ReconcileRes {
    fn from(outcome: &ReconcileOutcome) -> Self {
        ReconcileRes {
            mapping: MappingDto::from(&outcome.mapping),
            case: outcome.case.to_string(),
            summary: outcome.summary.into(),
            noop: outcome.is_noop(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchItemRes {
    pub code: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ReconcileRes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchReconcileRes {
    pub refset_code: String,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemRes>,
}

impl From<&BatchReport> for BatchReconcileRes {
    fn from(report: &BatchReport) -> Self {
        let results = report
            .items
            .iter()
            .map(|item| match &item.outcome {
                Ok(outcome) => BatchItemRes {
                    code: item.code.clone(),
                    ok: true,
                    result: Some(ReconcileRes::from(outcome)),
                    error: None,
                },
                Err(err) => BatchItemRes {
                    code: item.code.clone(),
                    ok: false,
                    result: None,
                    error: Some(err.to_string()),
                },
            })
            .collect();
        BatchReconcileRes {
            refset_code: report.refset_code.clone(),
            succeeded: report.succeeded(),
            failed: report.failed(),
            results,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatingRes {
    pub refset_code: String,
    pub updating: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MergeRes {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}
