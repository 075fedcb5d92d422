//! # RMS Core
//!
//! Reconciliation engine for SNOMED CT map reference sets.
//!
//! This crate holds the mapping domain model and everything needed to bring a remote map
//! reference set in line with a submitted mapping:
//! - identity and equivalence of map entries, and International/local edition precedence
//! - the mutation planner (pure, no I/O)
//! - the executor, job poller and branch merger that drive the terminology store
//! - per-refset locks and branch-scoped snapshot caching
//!
//! **No transport concerns**: the HTTP client for the terminology server lives in
//! `snowstorm-client`, and the REST surface in `api-rest`. The engine only sees the traits in
//! [`store`].

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod identity;
pub mod locks;
pub mod merge;
pub mod model;
pub mod planner;
pub mod poller;
pub mod precedence;
pub mod service;
pub mod store;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use config::CoreConfig;
pub use error::{MappingError, MappingResult};
pub use model::{MapEntry, MapSet, Mapping};
pub use planner::{MutationPlan, PlanCase, PlanSummary};
pub use service::{BatchItem, BatchReport, MappingService, ReconcileOutcome};
pub use store::{CacheInvalidator, ConceptResolver, JobStatus, TerminologyStore};
