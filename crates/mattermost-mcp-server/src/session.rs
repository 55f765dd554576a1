//! Transport-agnostic MCP session engine.
//!
//! [`ToolServer`] holds what every session shares (registry, provider,
//! attribution setting, outbound HTTP client). [`McpSession`] binds it to one caller's
//! credentials and access mode and answers JSON-RPC messages.

use mattermost_mcp_auth::{AuthContext, AuthenticationProvider};
use mattermost_mcp_core::AccessMode;
use mattermost_mcp_protocol::{
    error_codes, negotiate_protocol_version, CallToolParams, Implementation, InitializeParams,
    InitializeResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId,
    ServerCapabilities, ToolCallResult, LATEST_PROTOCOL_VERSION, METHOD_INITIALIZE,
    METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use mattermost_mcp_tools::{ToolContext, ToolRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "Tools for reading and writing Mattermost posts, channels, teams and users. \
Post, channel, team and user IDs are 26-character strings returned by the search and info tools.";

/// State shared by every session of one server process.
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
    provider: Arc<dyn AuthenticationProvider>,
    track_ai_generated: bool,
    server_info: Implementation,
    http: reqwest::Client,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry, provider: Arc<dyn AuthenticationProvider>) -> Self {
        Self {
            registry: Arc::new(registry),
            provider,
            track_ai_generated: false,
            server_info: Implementation::default(),
            http: reqwest::Client::new(),
        }
    }

    /// Client used by tools for outbound fetches. One pool for every call.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Tag posts created through tools with the author id.
    pub fn with_tracking(mut self, track_ai_generated: bool) -> Self {
        self.track_ai_generated = track_ai_generated;
        self
    }

    pub fn with_server_info(mut self, server_info: Implementation) -> Self {
        self.server_info = server_info;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn AuthenticationProvider> {
        &self.provider
    }
}

/// One caller's view of a [`ToolServer`].
#[derive(Clone)]
pub struct McpSession {
    server: Arc<ToolServer>,
    auth: AuthContext,
    mode: AccessMode,
}

impl McpSession {
    pub fn new(server: Arc<ToolServer>, auth: AuthContext, mode: AccessMode) -> Self {
        Self { server, auth, mode }
    }

    pub fn access_mode(&self) -> AccessMode {
        self.mode
    }

    /// Handle one raw frame. Unparseable input yields a parse error with a
    /// null id.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(raw) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "Unparseable JSON-RPC message");
                Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    /// Handle a request. Notifications return `None`.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, id = ?request.id, mode = %self.mode, "Handling MCP request");

        let Some(id) = request.id else {
            match request.method.as_str() {
                METHOD_INITIALIZED => debug!("Client finished initialization"),
                other => debug!(method = %other, "Ignoring notification"),
            }
            return None;
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                Some(id),
                error_codes::INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        let response = match request.method.as_str() {
            METHOD_INITIALIZE => self.initialize(id, request.params),
            METHOD_PING => JsonRpcResponse::success(Some(id), json!({})),
            METHOD_TOOLS_LIST => self.list_tools(id),
            METHOD_TOOLS_CALL => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::error(
                Some(id),
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let requested = match params {
            None => LATEST_PROTOCOL_VERSION.to_string(),
            Some(p) => match serde_json::from_value::<InitializeParams>(p) {
                Ok(params) => {
                    info!(
                        client = %params.client_info.name,
                        client_version = %params.client_info.version,
                        protocol = %params.protocol_version,
                        "MCP client connected"
                    );
                    params.protocol_version
                }
                Err(e) => {
                    return JsonRpcResponse::error(
                        Some(id),
                        error_codes::INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    )
                }
            },
        };

        reply(
            id,
            &InitializeResult {
                protocol_version: negotiate_protocol_version(&requested).to_string(),
                capabilities: ServerCapabilities::with_tools(),
                server_info: self.server.server_info.clone(),
                instructions: Some(INSTRUCTIONS.to_string()),
            },
        )
    }

    fn list_tools(&self, id: RequestId) -> JsonRpcResponse {
        let tools = self.server.registry.list_tools(self.mode);
        debug!(count = tools.len(), mode = %self.mode, "Listing tools");
        reply(id, &ListToolsResult { tools })
    }

    async fn call_tool(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    Some(id),
                    error_codes::INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                )
            }
            None => {
                return JsonRpcResponse::error(Some(id), error_codes::INVALID_PARAMS, "Missing params")
            }
        };

        if !self.server.registry.contains(&params.name) {
            return JsonRpcResponse::error(
                Some(id),
                error_codes::INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            );
        }

        let client = match self.server.provider.authenticated_client(&self.auth).await {
            Ok(client) => client,
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Could not authenticate tool call");
                return reply(id, &ToolCallResult::error(format!("authentication failed: {}", e)));
            }
        };

        let ctx = ToolContext::new(client, self.mode, self.server.http.clone())
            .with_tracking(self.server.track_ai_generated);
        let result = self
            .server
            .registry
            .execute(&params.name, params.arguments, &ctx)
            .await;
        reply(id, &result)
    }
}

fn reply<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(Some(id), value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            error_codes::INTERNAL_ERROR,
            format!("failed to encode result: {}", e),
        ),
    }
}
