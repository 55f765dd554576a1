//! Error types for OAuth discovery and remote connects.

use crate::authorize::AuthorizationRequest;
use mattermost_mcp_protocol::McpError;
use thiserror::Error;

/// Why discovery of the authorization server failed.
///
/// Any of these is terminal for the current connection attempt.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid metadata document at {url}: {reason}")]
    InvalidDocument { url: String, reason: String },

    #[error("metadata document at {url} is missing '{field}'")]
    MissingField { url: String, field: &'static str },
}

impl DiscoveryError {
    pub(crate) fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Outcome of a failed remote connect.
#[derive(Debug, Error)]
pub enum RemoteConnectError {
    /// The server wants OAuth; send the user to the authorization URL.
    #[error("authorization needed: {}", .0.url)]
    OAuthNeeded(AuthorizationRequest),

    /// The server challenged but discovery failed.
    #[error("OAuth discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Connection(#[from] McpError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiscoveryError::MissingField {
            url: "https://as.example/.well-known/oauth-authorization-server".to_string(),
            field: "token_endpoint",
        };
        assert_eq!(
            err.to_string(),
            "metadata document at https://as.example/.well-known/oauth-authorization-server is missing 'token_endpoint'"
        );

        let err = DiscoveryError::Status {
            url: "https://mcp.example/x".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "https://mcp.example/x returned HTTP 404");
    }

    #[test]
    fn test_connect_error_display() {
        let err = RemoteConnectError::OAuthNeeded(AuthorizationRequest {
            url: "https://as.example/authorize?x=1".to_string(),
            state: "s".to_string(),
            code_verifier: "v".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "authorization needed: https://as.example/authorize?x=1"
        );

        let err: RemoteConnectError = McpError::Timeout.into();
        assert_eq!(err.to_string(), "Server timeout");
    }
}
