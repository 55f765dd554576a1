//! Recognising "needs OAuth" failures.
//!
//! The typed path is [`McpError::AuthRequired`]. When an outer layer has
//! flattened that into a string, [`ChallengeMarkerFallback`] recovers the
//! metadata URL from the `resource_metadata="<url>"` marker in the text.

use mattermost_mcp_protocol::McpError;
use regex::Regex;
use std::sync::OnceLock;

static RESOURCE_METADATA: OnceLock<Regex> = OnceLock::new();

fn marker_regex() -> &'static Regex {
    RESOURCE_METADATA.get_or_init(|| {
        Regex::new(r#"resource_metadata="([^"]+)""#)
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// An authorization challenge extracted from a failed connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// Protected resource metadata URL, when the server named one.
    pub resource_metadata: Option<String>,
}

/// Decides whether an error means the server wants OAuth.
pub trait ChallengeParser: Send + Sync {
    fn parse(&self, error: &McpError) -> Option<AuthChallenge>;
}

/// Matches [`McpError::AuthRequired`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TypedChallenge;

impl ChallengeParser for TypedChallenge {
    fn parse(&self, error: &McpError) -> Option<AuthChallenge> {
        match error {
            McpError::AuthRequired { resource_metadata } => Some(AuthChallenge {
                resource_metadata: resource_metadata.clone(),
            }),
            _ => None,
        }
    }
}

/// Pattern-matches the marker in the error text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChallengeMarkerFallback;

impl ChallengeParser for ChallengeMarkerFallback {
    fn parse(&self, error: &McpError) -> Option<AuthChallenge> {
        resource_metadata_param(&error.to_string()).map(|url| AuthChallenge {
            resource_metadata: Some(url),
        })
    }
}

/// Typed match first, then the text marker.
pub fn detect_challenge(error: &McpError) -> Option<AuthChallenge> {
    TypedChallenge
        .parse(error)
        .or_else(|| ChallengeMarkerFallback.parse(error))
}

/// The `resource_metadata` parameter of a `WWW-Authenticate` value (or any
/// text carrying the marker).
pub fn resource_metadata_param(text: &str) -> Option<String> {
    marker_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRM: &str = "https://mcp.example.com/.well-known/oauth-protected-resource";

    #[test]
    fn test_header_param() {
        assert_eq!(
            resource_metadata_param(&format!("Bearer resource_metadata=\"{}\"", PRM)).as_deref(),
            Some(PRM)
        );
        assert_eq!(
            resource_metadata_param(&format!(
                "Bearer error=\"invalid_token\", resource_metadata=\"{}\"",
                PRM
            ))
            .as_deref(),
            Some(PRM)
        );
        assert_eq!(resource_metadata_param("Bearer realm=\"mm\""), None);
    }

    #[test]
    fn test_typed_challenge() {
        let err = McpError::auth_required(None);
        assert_eq!(
            detect_challenge(&err),
            Some(AuthChallenge {
                resource_metadata: None
            })
        );
        assert!(TypedChallenge.parse(&McpError::Timeout).is_none());
    }

    #[test]
    fn test_marker_survives_flattening() {
        let inner = McpError::auth_required(Some(PRM.to_string()));
        let flattened = McpError::InitializationFailed(inner.to_string());

        assert!(TypedChallenge.parse(&flattened).is_none());
        let challenge = detect_challenge(&flattened).unwrap();
        assert_eq!(challenge.resource_metadata.as_deref(), Some(PRM));
    }

    #[test]
    fn test_unrelated_errors() {
        assert!(detect_challenge(&McpError::connection_failed("refused")).is_none());
        assert!(detect_challenge(&McpError::ConnectionClosed).is_none());
    }
}
