//! OAuth 2.0 Protected Resource Metadata (RFC 9728).

use crate::config::HttpServerConfig;
use serde::{Deserialize, Serialize};

/// The document served at `/.well-known/oauth-protected-resource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    #[serde(default)]
    pub authorization_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,
}

impl ProtectedResourceMetadata {
    /// Metadata for this server, or `None` when no site URL is configured.
    pub fn for_config(config: &HttpServerConfig) -> Option<Self> {
        config.site_url.as_ref()?;
        Some(Self {
            resource: config.resource_url(),
            authorization_servers: vec![config.mattermost_url.trim_end_matches('/').to_string()],
            scopes_supported: (!config.scopes_supported.is_empty())
                .then(|| config.scopes_supported.clone()),
            resource_name: config.resource_name.clone(),
            bearer_methods_supported: Some(vec!["header".to_string()]),
        })
    }
}

/// `WWW-Authenticate` value for a 401 from this server.
pub fn bearer_challenge(config: &HttpServerConfig, error: Option<&str>) -> String {
    match error {
        Some(error) => format!(
            "Bearer error=\"{}\", resource_metadata=\"{}\"",
            error,
            config.resource_metadata_url()
        ),
        None => format!(
            "Bearer resource_metadata=\"{}\"",
            config.resource_metadata_url()
        ),
    }
}
