//! MCP server for Mattermost.
//!
//! One session engine ([`McpSession`]) behind three transports:
//!
//! - [`StdioServer`]: newline-delimited JSON-RPC with a fixed personal access
//!   token, local access mode
//! - [`HttpServer`]: `/mcp` and legacy SSE with per-request OAuth bearer
//!   tokens, remote access mode
//! - [`InMemoryServer`]: channel pairs for hosts embedding the server,
//!   remote access mode
//!
//! # Example
//!
//! ```rust,ignore
//! use mattermost_mcp_server::{StdioServer, ToolServer};
//! use mattermost_mcp_tools::ToolRegistry;
//!
//! let server = ToolServer::new(ToolRegistry::with_catalog(false), provider);
//! StdioServer::new(Arc::new(server), token).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod metadata;
pub mod security;
pub mod session;
pub mod stdio;

pub use config::{HttpServerConfig, MCP_PATH, PROTECTED_RESOURCE_PATH};
pub use error::{ServerError, ServerResult};
pub use http::{create_router, HttpServer, HttpState};
pub use memory::{InMemoryServer, InMemoryTransport};
pub use metadata::{bearer_challenge, ProtectedResourceMetadata};
pub use security::{normalize_origin, OriginAllowList};
pub use session::{McpSession, ToolServer};
pub use stdio::{StdioServer, StdioState};
