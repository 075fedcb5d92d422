use crate::ApiError;

/// Header carrying the API key on mutating requests.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Environment variable holding the expected API key.
pub const ENV_API_KEY: &str = "API_KEY";

/// Validates the provided API key against the expected one.
///
/// With no expected key configured, every request is accepted.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorised`] if a key is expected and `provided` is missing or differs.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected.filter(|key| !key.is_empty()) else {
        return Ok(());
    };
    match provided {
        Some(key) if key == expected => Ok(()),
        _ => Err(ApiError::Unauthorised),
    }
}
