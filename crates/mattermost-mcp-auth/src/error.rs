//! Error types for authentication.

use mattermost_mcp_core::ApiError;
use thiserror::Error;

/// Errors raised while establishing who a caller is.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carried no usable credentials.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// Mattermost rejected the credentials.
    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    /// The provider was handed a context of the wrong kind.
    #[error("{provider} provider cannot use {context} credentials")]
    UnsupportedContext {
        provider: &'static str,
        context: &'static str,
    },

    /// The session could not be mapped to a token.
    #[error("failed to resolve token for session: {0}")]
    SessionResolution(String),

    /// The authenticated user is not the one the caller claimed to be.
    #[error("user mismatch: expected {expected}, authenticated as {actual}")]
    IdentityMismatch { expected: String, actual: String },

    /// Any other upstream failure.
    #[error("upstream error: {0}")]
    Upstream(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) => AuthError::InvalidToken(message),
            other => AuthError::Upstream(other),
        }
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
