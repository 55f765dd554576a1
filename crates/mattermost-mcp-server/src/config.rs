//! HTTP transport settings.

use mattermost_mcp_core::config::{binds_all_interfaces, DEFAULT_HTTP_BIND_ADDR, DEFAULT_HTTP_PORT};
use mattermost_mcp_core::Config;

/// Path of the protected-resource metadata document.
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// Path of the streaming MCP endpoint.
pub const MCP_PATH: &str = "/mcp";

/// Settings of the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Externally reachable URL of this server.
    pub site_url: Option<String>,
    /// Public Mattermost URL: the OAuth authorization server and an allowed
    /// browser origin.
    pub mattermost_url: String,
    /// Human-readable name in the metadata document.
    pub resource_name: Option<String>,
    pub scopes_supported: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_HTTP_BIND_ADDR.to_string(),
            port: DEFAULT_HTTP_PORT,
            site_url: None,
            mattermost_url: String::new(),
            resource_name: Some("Mattermost MCP Server".to_string()),
            scopes_supported: Vec::new(),
        }
    }
}

impl HttpServerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.http_bind_addr.clone(),
            port: config.http_port,
            site_url: config.site_url.clone().filter(|s| !s.trim().is_empty()),
            mattermost_url: config.server_url.clone(),
            ..Self::default()
        }
    }

    /// `host:port` to listen on.
    pub fn listen_addr(&self) -> String {
        let host = self.bind_addr.trim();
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Base URL clients use to reach this server, without a trailing slash.
    ///
    /// The site URL when configured, otherwise a loopback URL on the
    /// configured port.
    pub fn public_base_url(&self) -> String {
        if let Some(site) = &self.site_url {
            return site.trim_end_matches('/').to_string();
        }
        let host = if binds_all_interfaces(&self.bind_addr) {
            "localhost".to_string()
        } else if self.bind_addr.contains(':') && !self.bind_addr.starts_with('[') {
            format!("[{}]", self.bind_addr)
        } else {
            self.bind_addr.clone()
        };
        format!("http://{}:{}", host, self.port)
    }

    /// Protected resource identifier: the MCP endpoint URL.
    pub fn resource_url(&self) -> String {
        format!("{}{}", self.public_base_url(), MCP_PATH)
    }

    /// URL advertised in `WWW-Authenticate` challenges.
    pub fn resource_metadata_url(&self) -> String {
        format!("{}{}", self.public_base_url(), PROTECTED_RESOURCE_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mattermost_mcp_core::TransportMode;

    #[test]
    fn test_from_config() {
        let config = Config::new("https://chat.example.com")
            .with_transport(TransportMode::Http)
            .with_site_url("https://mcp.example.com/");
        let http = HttpServerConfig::from_config(&config);

        assert_eq!(http.listen_addr(), "127.0.0.1:8080");
        assert_eq!(http.resource_url(), "https://mcp.example.com/mcp");
        assert_eq!(
            http.resource_metadata_url(),
            "https://mcp.example.com/.well-known/oauth-protected-resource"
        );
    }

    #[test]
    fn test_loopback_fallback() {
        let http = HttpServerConfig {
            bind_addr: "::1".to_string(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(http.listen_addr(), "[::1]:9000");
        assert_eq!(http.public_base_url(), "http://[::1]:9000");

        let http = HttpServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            ..Default::default()
        };
        assert_eq!(http.public_base_url(), "http://localhost:8080");
    }
}
