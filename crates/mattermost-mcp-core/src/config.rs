//! Runtime configuration.
//!
//! The binary builds a [`Config`] from command line flags and environment
//! variables, calls [`Config::validate`] once, and then hands the value to
//! every constructor that needs it. Nothing in the library crates reads the
//! environment on its own.

use crate::access::TransportMode;
use crate::error::{ConfigError, ConfigResult};
use std::path::PathBuf;
use url::Url;

/// Default port of the HTTP transport.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default bind address of the HTTP transport.
pub const DEFAULT_HTTP_BIND_ADDR: &str = "127.0.0.1";

/// Default bound on a single tool call, in seconds.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Validated configuration of one server process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public Mattermost URL. Also an allowed browser origin.
    pub server_url: String,
    /// URL used for API calls when the public one is not reachable from here.
    pub internal_server_url: Option<String>,
    /// Personal access token (stdio transport).
    pub token: Option<String>,
    /// Expose development-only tools.
    pub dev_mode: bool,
    pub transport: TransportMode,
    pub http_port: u16,
    pub http_bind_addr: String,
    /// Externally reachable URL of this server (HTTP transport).
    pub site_url: Option<String>,
    /// Tag created posts with the id of the bot or user that produced them.
    pub track_ai_generated: bool,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub tool_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            internal_server_url: None,
            token: None,
            dev_mode: false,
            transport: TransportMode::Stdio,
            http_port: DEFAULT_HTTP_PORT,
            http_bind_addr: DEFAULT_HTTP_BIND_ADDR.to_string(),
            site_url: None,
            track_ai_generated: false,
            debug: false,
            log_file: None,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Create a configuration for the given server URL with defaults elsewhere.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Check everything that must hold before a transport starts.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::MissingServerUrl);
        }
        parse_url("server URL", &self.server_url)?;

        if let Some(internal) = self.internal_server_url.as_deref() {
            parse_url("internal server URL", internal)?;
        }

        if self.transport == TransportMode::Stdio
            && self.token.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(ConfigError::MissingToken(self.transport.to_string()));
        }

        if self.transport == TransportMode::Http {
            if let Some(site) = self.site_url.as_deref() {
                parse_url("site URL", site)?;
            } else if binds_all_interfaces(&self.http_bind_addr) {
                return Err(ConfigError::UnsafeBind(self.http_bind_addr.clone()));
            }
        }

        Ok(())
    }

    /// The URL API calls are sent to.
    pub fn api_base_url(&self) -> &str {
        self.internal_server_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.server_url)
    }

    pub fn tool_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tool_timeout_secs)
    }
}

fn parse_url(field: &'static str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        message: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            field,
            message: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Whether a bind address listens on every interface.
pub fn binds_all_interfaces(addr: &str) -> bool {
    matches!(
        addr.trim().trim_start_matches('[').trim_end_matches(']'),
        "0.0.0.0" | "::" | ""
    )
}
