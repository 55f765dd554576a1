//! Error types for configuration and the Mattermost API contract.

use thiserror::Error;

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No Mattermost server URL was given.
    #[error("server URL is required (use --server-url or MM_SERVER_URL)")]
    MissingServerUrl,

    /// No personal access token was given for a transport that needs one.
    #[error("access token is required for the {0} transport (use --token or MM_ACCESS_TOKEN)")]
    MissingToken(String),

    /// A URL could not be parsed.
    #[error("invalid {field}: {message}")]
    InvalidUrl { field: &'static str, message: String },

    /// Unknown transport name.
    #[error("invalid transport '{0}' (expected 'stdio' or 'http')")]
    InvalidTransport(String),

    /// Unknown access mode name.
    #[error("invalid access mode '{0}' (expected 'local' or 'remote')")]
    InvalidAccessMode(String),

    /// Binding to every interface without an externally reachable URL.
    #[error("refusing to bind to {0} without --site-url; set the externally reachable URL or bind to 127.0.0.1")]
    UnsafeBind(String),
}

/// Result type for Mattermost API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by a [`MattermostClient`](crate::MattermostClient).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested entity does not exist or is not visible.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether the error means the credentials are no longer usable.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let errors = vec![
            (
                ConfigError::MissingServerUrl,
                "server URL is required (use --server-url or MM_SERVER_URL)",
            ),
            (
                ConfigError::InvalidTransport("grpc".to_string()),
                "invalid transport 'grpc' (expected 'stdio' or 'http')",
            ),
            (
                ConfigError::InvalidUrl {
                    field: "site URL",
                    message: "relative URL without a base".to_string(),
                },
                "invalid site URL: relative URL without a base",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_unsafe_bind_mentions_site_url() {
        let err = ConfigError::UnsafeBind("0.0.0.0".to_string());
        assert!(err.to_string().contains("--site-url"));
        assert!(err.to_string().contains("0.0.0.0"));
    }

    #[test]
    fn test_api_error_is_unauthorized() {
        assert!(ApiError::Unauthorized("expired".to_string()).is_unauthorized());
        assert!(!ApiError::NotFound("post".to_string()).is_unauthorized());
        assert!(!ApiError::Status {
            status: 500,
            message: "boom".to_string()
        }
        .is_unauthorized());
    }
}
