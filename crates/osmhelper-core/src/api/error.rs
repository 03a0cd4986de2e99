use thiserror::Error;

/// Errors surfaced by the OSM API client.
///
/// `Clone` so a single failed fetch can be handed to every caller that was
/// waiting on the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("No access token - please sign in")]
    Unauthenticated,

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited. Try again in {} seconds.", wait_display(.retry_in_secs))]
    RateLimited { retry_in_secs: Option<u64> },

    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn wait_display(retry_in_secs: &Option<u64>) -> String {
    match retry_in_secs {
        Some(secs) => secs.to_string(),
        None => "a few".to_string(),
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build the error for a non-2xx status. `retry_in_secs` is only used for 429.
    pub fn from_status(status: u16, body: &str, retry_in_secs: Option<u64>) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited { retry_in_secs },
            500..=599 => ApiError::ServerError { status, body: truncated },
            _ => ApiError::HttpStatus { status, body: truncated },
        }
    }

    /// HTTP status behind this error, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::ServerError { status, .. } | ApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for errors that mean the user has to sign in again.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Unauthenticated | ApiError::Unauthorized)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}
