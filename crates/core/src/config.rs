//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses. Binaries hand [`CoreConfig::from_lookup`] a closure over their environment;
//! tests hand it a map.

use crate::constants::{
    DEFAULT_BRANCH, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_POLL_DEADLINE_MS, DEFAULT_POLL_INTERVAL_MS,
    INTERNATIONAL_MODULE_ID,
};
use crate::{MappingError, MappingResult};
use rms_types::{BranchPath, NonEmptyText};
use std::time::Duration;

pub const ENV_TERMINOLOGY_URL: &str = "RMS_TERMINOLOGY_URL";
pub const ENV_BRANCH: &str = "RMS_BRANCH";
pub const ENV_MODULE_ID: &str = "RMS_MODULE_ID";
pub const ENV_INTERNATIONAL_MODULE_ID: &str = "RMS_INTERNATIONAL_MODULE_ID";
pub const ENV_POLL_INTERVAL_MS: &str = "RMS_POLL_INTERVAL_MS";
pub const ENV_POLL_DEADLINE_MS: &str = "RMS_POLL_DEADLINE_MS";
pub const ENV_HTTP_TIMEOUT_MS: &str = "RMS_HTTP_TIMEOUT_MS";

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    terminology_url: String,
    branch: BranchPath,
    module_id: NonEmptyText,
    international_module_id: NonEmptyText,
    poll_interval: Duration,
    poll_deadline: Option<Duration>,
    http_timeout: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with default polling and HTTP timings.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidInput`] if `terminology_url` is not an http(s) URL, or if
    /// the local module is the International module (a local edition must own its overrides).
    pub fn new(
        terminology_url: impl Into<String>,
        branch: BranchPath,
        module_id: NonEmptyText,
        international_module_id: NonEmptyText,
    ) -> MappingResult<Self> {
        let terminology_url = terminology_url.into().trim().trim_end_matches('/').to_string();
        if !(terminology_url.starts_with("http://") || terminology_url.starts_with("https://")) {
            return Err(MappingError::InvalidInput(format!(
                "terminology url must start with http:// or https://, got '{terminology_url}'"
            )));
        }
        if module_id == international_module_id {
            return Err(MappingError::InvalidInput(
                "local module id cannot be the International module id".into(),
            ));
        }

        Ok(Self {
            terminology_url,
            branch,
            module_id,
            international_module_id,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_deadline: Some(Duration::from_millis(DEFAULT_POLL_DEADLINE_MS)),
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
        })
    }

    /// Resolve configuration from named values.
    ///
    /// `lookup` is asked for each `RMS_*` variable; binaries pass a closure over the process
    /// environment. Missing optional values fall back to the defaults in [`crate::constants`].
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is missing or any value fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MappingResult<Self> {
        let terminology_url = lookup(ENV_TERMINOLOGY_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| MappingError::InvalidInput(format!("{ENV_TERMINOLOGY_URL} is required")))?;
        let branch = BranchPath::new(
            lookup(ENV_BRANCH)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BRANCH.into()),
        )?;
        let module_id = NonEmptyText::new(
            lookup(ENV_MODULE_ID)
                .ok_or_else(|| MappingError::InvalidInput(format!("{ENV_MODULE_ID} is required")))?,
        )?;
        let international_module_id = NonEmptyText::new(
            lookup(ENV_INTERNATIONAL_MODULE_ID)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| INTERNATIONAL_MODULE_ID.into()),
        )?;

        let mut cfg = Self::new(terminology_url, branch, module_id, international_module_id)?;
        cfg.poll_interval = duration_ms_from_env_value(
            ENV_POLL_INTERVAL_MS,
            lookup(ENV_POLL_INTERVAL_MS),
            DEFAULT_POLL_INTERVAL_MS,
        )?;
        cfg.poll_deadline = deadline_ms_from_env_value(lookup(ENV_POLL_DEADLINE_MS))?;
        cfg.http_timeout = duration_ms_from_env_value(
            ENV_HTTP_TIMEOUT_MS,
            lookup(ENV_HTTP_TIMEOUT_MS),
            DEFAULT_HTTP_TIMEOUT_MS,
        )?;
        Ok(cfg)
    }

    /// Override the job polling cadence and deadline.
    pub fn with_polling(mut self, interval: Duration, deadline: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self.poll_deadline = deadline;
        self
    }

    pub fn terminology_url(&self) -> &str {
        &self.terminology_url
    }

    pub fn branch(&self) -> &BranchPath {
        &self.branch
    }

    pub fn module_id(&self) -> &NonEmptyText {
        &self.module_id
    }

    pub fn international_module_id(&self) -> &NonEmptyText {
        &self.international_module_id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn poll_deadline(&self) -> Option<Duration> {
        self.poll_deadline
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

/// Parse a millisecond duration from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `default_ms`. Zero is rejected because a
/// zero interval would spin against the remote store.
pub fn duration_ms_from_env_value(
    name: &str,
    value: Option<String>,
    default_ms: u64,
) -> MappingResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let ms = match value {
        Some(v) => v.parse::<u64>().map_err(|_| {
            MappingError::InvalidInput(format!("{name} must be a whole number of milliseconds, got '{v}'"))
        })?,
        None => default_ms,
    };
    if ms == 0 {
        return Err(MappingError::InvalidInput(format!("{name} must be greater than zero")));
    }
    Ok(Duration::from_millis(ms))
}

/// Parse the job deadline. `0` disables the deadline; empty means the default.
pub fn deadline_ms_from_env_value(value: Option<String>) -> MappingResult<Option<Duration>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(Some(Duration::from_millis(DEFAULT_POLL_DEADLINE_MS))),
        Some(v) => {
            let ms = v.parse::<u64>().map_err(|_| {
                MappingError::InvalidInput(format!(
                    "{ENV_POLL_DEADLINE_MS} must be a whole number of milliseconds, got '{v}'"
                ))
            })?;
            Ok((ms > 0).then(|| Duration::from_millis(ms)))
        }
    }
}
