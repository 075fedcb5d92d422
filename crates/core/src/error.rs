use std::time::Duration;

/// Errors raised by the reconciliation engine and its collaborators.
///
/// Every variant aborts the current reconciliation. Operations already applied remotely are not
/// rolled back, so a caller seeing any of these must treat the remote state as unknown and
/// re-run the (idempotent) reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid text: {0}")]
    InvalidText(#[from] rms_types::TextError),

    #[error("remote call failed: {url} returned {status} {reason}")]
    RemoteCallFailed {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("bulk job {url} failed: {message}")]
    BulkJobFailed { url: String, message: String },

    #[error("bulk request to {url} was accepted without a job location")]
    MissingJobHandle { url: String },

    #[error("bulk job {url} did not finish within {waited:?}")]
    Timeout { url: String, waited: Duration },

    #[error("cannot update {existing} from {submitted}: entries do not share identity")]
    IdentityViolation { existing: String, submitted: String },

    #[error("failed to (de)serialise terminology payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MappingError {
    /// True for errors caused by the remote store rather than by the caller's input.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            MappingError::RemoteCallFailed { .. }
                | MappingError::Transport { .. }
                | MappingError::BulkJobFailed { .. }
                | MappingError::MissingJobHandle { .. }
                | MappingError::Timeout { .. }
        )
    }
}

pub type MappingResult<T> = std::result::Result<T, MappingError>;
