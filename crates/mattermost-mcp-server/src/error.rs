//! Error types for the transport servers.

use mattermost_mcp_auth::AuthError;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors raised while starting or running a transport server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured token was rejected before serving began.
    #[error("startup token validation failed: {0}")]
    StartupValidation(#[source] AuthError),

    /// An embedded connection was refused.
    #[error("connection refused: {0}")]
    Auth(#[from] AuthError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] LinesCodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_validation_message() {
        let err = ServerError::StartupValidation(AuthError::InvalidToken("expired".to_string()));
        assert_eq!(
            err.to_string(),
            "startup token validation failed: invalid or expired token: expired"
        );
    }

    #[test]
    fn test_refusal_message() {
        let err: ServerError = AuthError::IdentityMismatch {
            expected: "u1".to_string(),
            actual: "u2".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("connection refused: user mismatch"));
    }
}
