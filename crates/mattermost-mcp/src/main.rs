//! mattermost-mcp - Mattermost tools for AI agents over MCP.
//!
//! Runs the MCP server over stdio with a personal access token, or over HTTP
//! with per-request OAuth bearer tokens.

mod logging;

use anyhow::Context;
use clap::Parser;
use mattermost_mcp_auth::{OAuthAuthProvider, TokenAuthProvider};
use mattermost_mcp_core::config::{DEFAULT_HTTP_BIND_ADDR, DEFAULT_HTTP_PORT};
use mattermost_mcp_core::{Config, ConfigError, RestClientFactory, TransportMode};
use mattermost_mcp_server::{HttpServer, HttpServerConfig, StdioServer, ToolServer};
use mattermost_mcp_tools::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "mattermost-mcp")]
#[command(author, version, about = "MCP server for Mattermost", long_about = None)]
struct Cli {
    /// Mattermost server URL
    #[arg(short, long, env = "MM_SERVER_URL")]
    server_url: Option<String>,

    /// Mattermost URL used for API calls, when it differs from the public one
    #[arg(long, env = "MM_INTERNAL_SERVER_URL")]
    internal_server_url: Option<String>,

    /// Personal access token (stdio transport)
    #[arg(short, long, env = "MM_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// Expose development tools
    #[arg(long)]
    dev: bool,

    /// Transport: stdio or http
    #[arg(long, default_value = "stdio")]
    transport: String,

    /// Port of the HTTP transport
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    http_port: u16,

    /// Bind address of the HTTP transport
    #[arg(long, default_value = DEFAULT_HTTP_BIND_ADDR)]
    http_bind_addr: String,

    /// Externally reachable URL of this server (HTTP transport)
    #[arg(long)]
    site_url: Option<String>,

    /// Tag created posts as AI generated
    #[arg(long)]
    track_ai_generated: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config, ConfigError> {
        let transport: TransportMode = self.transport.parse()?;
        let config = Config {
            server_url: self.server_url.unwrap_or_default(),
            internal_server_url: self.internal_server_url.filter(|u| !u.trim().is_empty()),
            token: self.token,
            dev_mode: self.dev,
            transport,
            http_port: self.http_port,
            http_bind_addr: self.http_bind_addr,
            site_url: self.site_url.filter(|u| !u.trim().is_empty()),
            track_ai_generated: self.track_ai_generated,
            debug: self.debug,
            log_file: self.logfile,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(config.debug, config.log_file.as_deref());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = %config.transport,
        server_url = %config.server_url,
        dev_mode = config.dev_mode,
        "Starting mattermost-mcp"
    );

    match config.transport {
        TransportMode::Stdio => run_stdio(&config).await,
        TransportMode::Http => run_http(&config).await,
    }
}

fn registry(config: &Config) -> ToolRegistry {
    ToolRegistry::with_catalog(config.dev_mode).with_timeout(config.tool_timeout())
}

async fn run_stdio(config: &Config) -> anyhow::Result<()> {
    let token = config.token.as_deref().unwrap_or_default();
    let factory = RestClientFactory::new(config.api_base_url())
        .context("failed to create Mattermost client")?;
    let provider = TokenAuthProvider::new(token, &factory)?;

    let server = ToolServer::new(registry(config), Arc::new(provider))
        .with_tracking(config.track_ai_generated);
    StdioServer::new(Arc::new(server), token).run().await?;
    Ok(())
}

async fn run_http(config: &Config) -> anyhow::Result<()> {
    let factory = RestClientFactory::new(config.api_base_url())
        .context("failed to create Mattermost client")?;
    let provider = OAuthAuthProvider::new(Arc::new(factory));

    let server = ToolServer::new(registry(config), Arc::new(provider))
        .with_tracking(config.track_ai_generated);
    HttpServer::new(Arc::new(server), HttpServerConfig::from_config(config))
        .run()
        .await?;
    Ok(())
}
