//! Constants used throughout the refset mapping core crate.
//!
//! SNOMED CT identifiers, wire-format literals and default tunables live here so the planner,
//! executor and configuration agree on a single value.

/// Module id of the SNOMED CT International Edition core module.
pub const INTERNATIONAL_MODULE_ID: &str = "900000000000207008";

/// Map correlation id written on every created or updated extended map member
/// ("map correlation not specified").
pub const MAP_CORRELATION_ID: &str = "447561005";

/// Separator used when joining map advices into the `mapAdvice` wire field.
pub const MAP_ADVICE_SEPARATOR: &str = " | ";

/// Default branch path when none is configured.
pub const DEFAULT_BRANCH: &str = "MAIN";

/// Default interval between async job status polls, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 800;

/// Default deadline for a single async job, in milliseconds (ten minutes).
pub const DEFAULT_POLL_DEADLINE_MS: u64 = 600_000;

/// Default per-request HTTP timeout for the terminology store client, in milliseconds.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on members requested when reading one source code's mapping.
pub const MEMBER_QUERY_LIMIT: usize = 1_000;

/// Terminology name used for SNOMED CT code systems.
pub const SNOMEDCT_TERMINOLOGY: &str = "SNOMEDCT";
