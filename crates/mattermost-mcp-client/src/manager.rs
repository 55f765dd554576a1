//! Per-user connection manager.
//!
//! [`UserClients`] owns every MCP connection opened on behalf of one user:
//! remote servers reached over HTTP and, when the host provides one, the
//! embedded server. It merges their tool catalogs and reconnects once when a
//! connection drops mid-call.

use crate::authorize::{build_authorization_request, AuthorizationRequest, OAuthClientConfig};
use crate::challenge::detect_challenge;
use crate::connection::{ConnectionTarget, ServerConnection};
use crate::discovery::OAuthDiscovery;
use crate::error::RemoteConnectError;
use crate::http::{HttpTransport, HttpTransportConfig};
use async_trait::async_trait;
use mattermost_mcp_auth::UserIdentityProvider;
use mattermost_mcp_protocol::{McpError, McpResult, McpTool, ToolCallResult, Transport};
use mattermost_mcp_server::{InMemoryServer, ServerError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Connection name of the embedded server.
pub const EMBEDDED_SERVER_NAME: &str = "mattermost";

/// A remote MCP server a user may connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServerConfig {
    pub name: String,
    pub url: String,
}

impl RemoteServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Opens transports to remote servers.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn open(&self, server: &RemoteServerConfig, token: Option<&str>) -> McpResult<Arc<dyn Transport>>;
}

/// [`RemoteConnector`] over streamable HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    pub timeout_secs: u64,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

#[async_trait]
impl RemoteConnector for HttpConnector {
    async fn open(&self, server: &RemoteServerConfig, token: Option<&str>) -> McpResult<Arc<dyn Transport>> {
        let transport = HttpTransport::new(HttpTransportConfig {
            url: server.url.clone(),
            auth_token: token.map(str::to_string),
            timeout_secs: self.timeout_secs,
        })?;
        Ok(Arc::new(transport))
    }
}

/// A server running inside the host process.
#[async_trait]
pub trait EmbeddedServer: Send + Sync {
    async fn connect(&self, user_id: &str, session_id: &str) -> McpResult<Arc<dyn Transport>>;
}

#[async_trait]
impl<P: UserIdentityProvider + 'static> EmbeddedServer for InMemoryServer<P> {
    async fn connect(&self, user_id: &str, session_id: &str) -> McpResult<Arc<dyn Transport>> {
        match InMemoryServer::connect(self, user_id, session_id).await {
            Ok(transport) => Ok(Arc::new(transport)),
            Err(ServerError::Auth(e)) => Err(McpError::AuthFailed(e.to_string())),
            Err(e) => Err(McpError::connection_failed(e.to_string())),
        }
    }
}

/// A server that wants the user to authorize first.
#[derive(Debug, Clone)]
pub struct OAuthNeeded {
    pub server: String,
    pub authorization: AuthorizationRequest,
}

#[derive(Debug, Clone)]
pub struct ConnectFailure {
    pub server: String,
    pub error: String,
}

/// Result of [`UserClients::connect_to_remote_servers`].
#[derive(Debug, Default)]
pub struct ConnectReport {
    pub connected: Vec<String>,
    pub oauth_needed: Vec<OAuthNeeded>,
    pub failed: Vec<ConnectFailure>,
}

#[derive(Default)]
struct ClientState {
    /// In connect order; earlier connections win tool name collisions.
    connections: Vec<Arc<ServerConnection>>,
    remotes: HashMap<String, RemoteServerConfig>,
    embedded: Option<Arc<dyn EmbeddedServer>>,
}

impl ClientState {
    fn position(&self, name: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.name() == name)
    }
}

/// All MCP connections of one user.
pub struct UserClients {
    user_id: String,
    token: Option<String>,
    oauth: OAuthClientConfig,
    discovery: OAuthDiscovery,
    connector: Arc<dyn RemoteConnector>,
    state: Mutex<ClientState>,
}

impl UserClients {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: None,
            oauth: OAuthClientConfig::default(),
            discovery: OAuthDiscovery::new(),
            connector: Arc::new(HttpConnector::default()),
            state: Mutex::new(ClientState::default()),
        }
    }

    /// Bearer token presented to remote servers.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_oauth_client(mut self, oauth: OAuthClientConfig) -> Self {
        self.oauth = oauth;
        self
    }

    pub fn with_discovery(mut self, discovery: OAuthDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Connect to each server not connected yet. One failure never stops
    /// the others.
    ///
    /// Connects run without holding the state lock, so servers that are
    /// already connected stay usable meanwhile.
    pub async fn connect_to_remote_servers(&self, servers: &[RemoteServerConfig]) -> ConnectReport {
        let mut report = ConnectReport::default();
        let pending: Vec<&RemoteServerConfig> = {
            let mut state = self.state.lock().await;
            servers
                .iter()
                .filter(|server| {
                    if state.position(&server.name).is_some() {
                        debug!(server = %server.name, "Already connected");
                        report.connected.push(server.name.clone());
                        return false;
                    }
                    state.remotes.insert(server.name.clone(), (*server).clone());
                    true
                })
                .collect()
        };

        for server in pending {
            match self.connect_remote(server).await {
                Ok(connection) => {
                    let connection = Arc::new(connection);
                    let mut state = self.state.lock().await;
                    if state.position(&server.name).is_some() {
                        drop(state);
                        debug!(server = %server.name, "Connected concurrently; dropping duplicate");
                        if let Err(e) = connection.close().await {
                            warn!(server = %server.name, error = %e, "Error closing duplicate connection");
                        }
                    } else {
                        state.connections.push(connection);
                    }
                    report.connected.push(server.name.clone());
                }
                Err(RemoteConnectError::OAuthNeeded(authorization)) => {
                    info!(server = %server.name, "Server requires OAuth authorization");
                    report.oauth_needed.push(OAuthNeeded {
                        server: server.name.clone(),
                        authorization,
                    });
                }
                Err(e) => {
                    warn!(server = %server.name, error = %e, "Failed to connect to MCP server");
                    report.failed.push(ConnectFailure {
                        server: server.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Connect the embedded server for `session_id`. No-op when it is
    /// already connected.
    pub async fn connect_to_embedded_server_if_available(
        &self,
        session_id: &str,
        embedded: Arc<dyn EmbeddedServer>,
    ) -> McpResult<()> {
        if session_id.is_empty() {
            return Err(McpError::AuthFailed(
                "a session id is required to reach the embedded server".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        if state.position(EMBEDDED_SERVER_NAME).is_some() {
            debug!(user_id = %self.user_id, "Embedded server already connected");
            return Ok(());
        }

        let connection = self.connect_embedded(embedded.as_ref(), session_id).await?;
        state.connections.push(Arc::new(connection));
        state.embedded = Some(embedded);
        Ok(())
    }

    /// Union of every connection's tools. On a name collision the earlier
    /// connection wins.
    pub async fn tools(&self) -> Vec<McpTool> {
        let state = self.state.lock().await;
        let mut owners: HashMap<String, &str> = HashMap::new();
        let mut tools = Vec::new();

        for connection in &state.connections {
            for tool in connection.tools() {
                if let Some(owner) = owners.get(&tool.name) {
                    warn!(
                        tool = %tool.name,
                        server = %connection.name(),
                        kept = %owner,
                        "Duplicate tool name; keeping the first"
                    );
                    continue;
                }
                owners.insert(tool.name.clone(), connection.name());
                tools.push(tool.clone());
            }
        }
        tools
    }

    /// Names of the connected servers, in connect order.
    pub async fn server_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.connections.iter().map(|c| c.name().to_string()).collect()
    }

    /// Call a tool on the first server that has it.
    ///
    /// A closed connection is reopened once and the call retried once.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallResult> {
        let connection = {
            let state = self.state.lock().await;
            state
                .connections
                .iter()
                .find(|c| c.has_tool(name))
                .cloned()
                .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?
        };

        match connection.call_tool(name, arguments.clone()).await {
            Err(e) if e.is_connection_closed() => {}
            other => return other,
        }

        warn!(tool = name, server = %connection.name(), "Connection closed; reconnecting once");
        let connection = self.reconnect(&connection).await?;
        match connection.call_tool(name, arguments).await {
            Err(e) if e.is_connection_closed() => Err(McpError::connection_failed(format!(
                "connection to '{}' closed again after reconnecting",
                connection.name()
            ))),
            other => other,
        }
    }

    /// Close every connection and forget them. Close failures are logged.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        for connection in state.connections.drain(..) {
            if let Err(e) = connection.close().await {
                warn!(server = %connection.name(), error = %e, "Error closing server connection");
            }
        }
        state.remotes.clear();
        state.embedded = None;
        debug!(user_id = %self.user_id, "Closed all connections");
    }

    async fn connect_remote(&self, server: &RemoteServerConfig) -> Result<ServerConnection, RemoteConnectError> {
        info!(server = %server.name, url = %server.url, "Connecting to MCP server");
        let attempt = async {
            let transport = self.connector.open(server, self.token.as_deref()).await?;
            ServerConnection::establish(
                server.name.clone(),
                ConnectionTarget::Remote {
                    url: server.url.clone(),
                },
                transport,
            )
            .await
        }
        .await;

        let err = match attempt {
            Ok(connection) => return Ok(connection),
            Err(e) => e,
        };
        let Some(challenge) = detect_challenge(&err) else {
            return Err(err.into());
        };

        let discovered = self
            .discovery
            .discover(&server.url, challenge.resource_metadata.as_deref())
            .await?;
        Err(RemoteConnectError::OAuthNeeded(build_authorization_request(
            &discovered,
            &self.oauth,
        )))
    }

    async fn connect_embedded(&self, embedded: &dyn EmbeddedServer, session_id: &str) -> McpResult<ServerConnection> {
        let transport = embedded.connect(&self.user_id, session_id).await?;
        ServerConnection::establish(
            EMBEDDED_SERVER_NAME,
            ConnectionTarget::Embedded {
                session_id: session_id.to_string(),
            },
            transport,
        )
        .await
    }

    /// Replace `stale` with a fresh connection to the same server.
    ///
    /// The lock is released while connecting. Whoever swaps first wins; a
    /// later arrival closes its own connection and uses the winner's.
    async fn reconnect(&self, stale: &Arc<ServerConnection>) -> McpResult<Arc<ServerConnection>> {
        enum Source {
            Embedded(Arc<dyn EmbeddedServer>, String),
            Remote(RemoteServerConfig),
        }

        let source = {
            let state = self.state.lock().await;
            let current = self.current(&state, stale)?;
            if !Arc::ptr_eq(current, stale) {
                debug!(server = %stale.name(), "Already reconnected by another call");
                return Ok(current.clone());
            }
            match stale.target() {
                ConnectionTarget::Embedded { session_id } => Source::Embedded(
                    state
                        .embedded
                        .clone()
                        .ok_or_else(|| McpError::connection_failed("embedded server is not available"))?,
                    session_id.clone(),
                ),
                ConnectionTarget::Remote { .. } => Source::Remote(
                    state
                        .remotes
                        .get(stale.name())
                        .cloned()
                        .ok_or_else(|| McpError::connection_failed(format!("unknown server '{}'", stale.name())))?,
                ),
            }
        };

        let fresh = match source {
            Source::Embedded(embedded, session_id) => self.connect_embedded(embedded.as_ref(), &session_id).await?,
            Source::Remote(server) => match self.connect_remote(&server).await {
                Ok(connection) => connection,
                Err(RemoteConnectError::Connection(e)) => return Err(e),
                Err(e) => return Err(McpError::AuthFailed(e.to_string())),
            },
        };
        let fresh = Arc::new(fresh);

        let mut state = self.state.lock().await;
        let outcome = match self.current(&state, stale) {
            Ok(current) if Arc::ptr_eq(current, stale) => Ok(None),
            Ok(current) => Ok(Some(current.clone())),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(None) => {}
            Ok(Some(winner)) => {
                drop(state);
                debug!(server = %stale.name(), "Lost reconnect race; closing duplicate");
                if let Err(e) = fresh.close().await {
                    warn!(server = %fresh.name(), error = %e, "Error closing duplicate connection");
                }
                return Ok(winner);
            }
            Err(e) => {
                drop(state);
                if let Err(close_err) = fresh.close().await {
                    warn!(server = %fresh.name(), error = %close_err, "Error closing connection");
                }
                return Err(e);
            }
        }

        if let Some(index) = state.position(stale.name()) {
            state.connections[index] = fresh.clone();
        }
        info!(server = %fresh.name(), "Reconnected to MCP server");
        Ok(fresh)
    }

    fn current<'a>(&self, state: &'a ClientState, stale: &ServerConnection) -> McpResult<&'a Arc<ServerConnection>> {
        state
            .position(stale.name())
            .map(|index| &state.connections[index])
            .ok_or_else(|| McpError::connection_failed(format!("server '{}' was closed", stale.name())))
    }
}
