//! # API Shared
//!
//! Shared definitions for the RMS interfaces.
//!
//! Contains:
//! - Request/response bodies and their conversions to engine types (`dto` module)
//! - `HealthService`
//! - API key validation and the `ApiError` status mapping
//!
//! Used by `api-rest` and the `rms` CLI.

pub mod auth;
pub mod dto;
pub mod error;
pub mod health;

pub use dto::*;
pub use error::ApiError;
pub use health::{HealthRes, HealthService};
