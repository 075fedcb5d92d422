//! # Snowstorm Client
//!
//! HTTP implementation of the engine's [`rms_core::TerminologyStore`] and
//! [`rms_core::ConceptResolver`] seams for the Snowstorm terminology server.
//!
//! Uses `reqwest` with rustls; all errors are reported as [`rms_core::MappingError`].

mod client;
mod concepts;

#[cfg(test)]
mod test_server;

pub use client::SnowstormClient;
