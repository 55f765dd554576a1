//! Client side of mattermost-mcp.
//!
//! - [`HttpTransport`]: streamable HTTP transport to a remote MCP server
//! - [`OAuthDiscovery`]: RFC 9728 / RFC 8414 lookups after a 401
//! - [`build_authorization_request`]: PKCE authorization URL
//! - [`UserClients`]: every connection of one user, with a merged tool
//!   catalog and one reconnect on a dropped connection
//!
//! # Example
//!
//! ```rust,ignore
//! use mattermost_mcp_client::{RemoteServerConfig, UserClients};
//!
//! let clients = UserClients::new(user_id).with_token(token);
//! let report = clients
//!     .connect_to_remote_servers(&[RemoteServerConfig::new("jira", "https://jira.example/mcp")])
//!     .await;
//! for needed in report.oauth_needed {
//!     println!("authorize {} at {}", needed.server, needed.authorization.url);
//! }
//! let result = clients.call_tool("search", serde_json::json!({"q": "outage"})).await?;
//! ```

pub mod authorize;
pub mod challenge;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod http;
pub mod manager;

pub use authorize::{build_authorization_request, AuthorizationRequest, OAuthClientConfig};
pub use challenge::{
    detect_challenge, AuthChallenge, ChallengeMarkerFallback, ChallengeParser, TypedChallenge,
};
pub use connection::{ConnectionTarget, ServerConnection};
pub use discovery::{AuthorizationServerMetadata, DiscoveredAuth, OAuthDiscovery};
pub use error::{DiscoveryError, DiscoveryResult, RemoteConnectError};
pub use http::{HttpTransport, HttpTransportConfig};
pub use manager::{
    ConnectFailure, ConnectReport, EmbeddedServer, HttpConnector, OAuthNeeded, RemoteConnector,
    RemoteServerConfig, UserClients, EMBEDDED_SERVER_NAME,
};
