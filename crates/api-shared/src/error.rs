use rms_core::MappingError;

/// Errors surfaced by the API layers.
///
/// Transport crates turn these into their own responses using [`ApiError::status_code`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid or missing API key")]
    Unauthorised,
    /// The terminology server rejected a call or could not be reached.
    #[error("terminology server error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorised => 401,
            ApiError::Upstream(_) => 502,
            ApiError::Internal(_) => 500,
        }
    }
}

impl From<MappingError> for ApiError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::InvalidInput(_) | MappingError::InvalidText(_) => {
                ApiError::BadRequest(err.to_string())
            }
            _ if err.is_remote() => ApiError::Upstream(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
