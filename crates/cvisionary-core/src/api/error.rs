use thiserror::Error;

use crate::auth::token::DecodeError;

/// Fallback message when a login failure carries no backend `detail`
pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed. Try again.";

/// Fallback message when a signup failure carries no backend `detail`
pub const SIGNUP_FALLBACK_MESSAGE: &str = "Signup failed. Try again.";

/// Login failures. `Display` is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Backend rejected the identity/secret/role combination; carries its
    /// `detail` verbatim.
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    NetworkError(String),

    #[error("Login succeeded but the server returned an unreadable token ({0})")]
    MalformedToken(DecodeError),
}

/// Signup failures. `Display` is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    NetworkError(String),
}

/// Failures of authenticated requests to the analysis backend.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - session may have expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
