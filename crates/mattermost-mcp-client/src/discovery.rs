//! OAuth 2.0 discovery for remote MCP servers.
//!
//! Two ordered lookups, both terminal on failure:
//!
//! 1. Protected Resource Metadata (RFC 9728) at the URL from the challenge,
//!    or at the well-known URL derived from the server URL.
//! 2. Authorization Server Metadata (RFC 8414) of the first listed
//!    authorization server.

use crate::error::{DiscoveryError, DiscoveryResult};
use mattermost_mcp_server::ProtectedResourceMetadata;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const PROTECTED_RESOURCE_WELL_KNOWN: &str = "/.well-known/oauth-protected-resource";
const AUTHORIZATION_SERVER_WELL_KNOWN: &str = "/.well-known/oauth-authorization-server";

/// Authorization server metadata, reduced to what the client uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,
}

/// Everything discovered for one server.
#[derive(Debug, Clone)]
pub struct DiscoveredAuth {
    pub resource: ProtectedResourceMetadata,
    pub authorization_server: AuthorizationServerMetadata,
}

/// Insert `well_known` between the origin and the path of `base`.
fn well_known_url(base: &str, well_known: &str) -> DiscoveryResult<String> {
    let url = Url::parse(base).map_err(|e| DiscoveryError::invalid_url(base, e))?;
    let host = url
        .host_str()
        .ok_or_else(|| DiscoveryError::invalid_url(base, "no host"))?;

    let mut out = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        out.push_str(&format!(":{}", port));
    }
    out.push_str(well_known);
    let path = url.path().trim_end_matches('/');
    if !path.is_empty() {
        out.push_str(path);
    }
    Ok(out)
}

/// `https://mcp.example/mcp` → `https://mcp.example/.well-known/oauth-protected-resource/mcp`.
pub fn protected_resource_metadata_url(server_url: &str) -> DiscoveryResult<String> {
    well_known_url(server_url, PROTECTED_RESOURCE_WELL_KNOWN)
}

/// `https://as.example/tenant` → `https://as.example/.well-known/oauth-authorization-server/tenant`.
pub fn authorization_server_metadata_url(issuer: &str) -> DiscoveryResult<String> {
    well_known_url(issuer, AUTHORIZATION_SERVER_WELL_KNOWN)
}

/// Fetches discovery documents.
#[derive(Debug, Clone)]
pub struct OAuthDiscovery {
    http: reqwest::Client,
}

impl Default for OAuthDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthDiscovery {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Run both lookups for `server_url`.
    pub async fn discover(
        &self,
        server_url: &str,
        resource_metadata: Option<&str>,
    ) -> DiscoveryResult<DiscoveredAuth> {
        let resource = self
            .protected_resource(server_url, resource_metadata)
            .await?;
        let issuer = resource
            .authorization_servers
            .first()
            .cloned()
            .unwrap_or_default();
        let authorization_server = self.authorization_server(&issuer).await?;
        Ok(DiscoveredAuth {
            resource,
            authorization_server,
        })
    }

    /// Fetch protected resource metadata. At least one authorization server
    /// must be listed.
    pub async fn protected_resource(
        &self,
        server_url: &str,
        resource_metadata: Option<&str>,
    ) -> DiscoveryResult<ProtectedResourceMetadata> {
        let url = match resource_metadata {
            Some(url) => url.to_string(),
            None => protected_resource_metadata_url(server_url)?,
        };
        let metadata: ProtectedResourceMetadata = self.fetch(&url).await?;
        if metadata.authorization_servers.is_empty() {
            return Err(DiscoveryError::MissingField {
                url,
                field: "authorization_servers",
            });
        }
        Ok(metadata)
    }

    /// Fetch authorization server metadata. The issuer in the document is
    /// not compared to `issuer`.
    pub async fn authorization_server(&self, issuer: &str) -> DiscoveryResult<AuthorizationServerMetadata> {
        let url = authorization_server_metadata_url(issuer)?;
        let raw: serde_json::Value = self.fetch(&url).await?;

        for field in ["issuer", "authorization_endpoint", "token_endpoint"] {
            let present = raw
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.is_empty());
            if !present {
                return Err(DiscoveryError::MissingField { url, field });
            }
        }

        serde_json::from_value(raw).map_err(|e| DiscoveryError::InvalidDocument {
            url,
            reason: e.to_string(),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> DiscoveryResult<T> {
        debug!(url = %url, "Fetching discovery document");
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| DiscoveryError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|source| DiscoveryError::Request {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| DiscoveryError::InvalidDocument {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
