//! One live session to one upstream MCP server.

use mattermost_mcp_protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, McpError, McpResult, McpTool, ToolCallResult, Transport, METHOD_INITIALIZE,
    METHOD_INITIALIZED, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a connection leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Remote { url: String },
    /// Kept so the session can be reopened after the transport closes.
    Embedded { session_id: String },
}

/// A connected, initialized server and its tool catalog.
pub struct ServerConnection {
    name: String,
    target: ConnectionTarget,
    transport: Arc<dyn Transport>,
    server_info: InitializeResult,
    tools: Vec<McpTool>,
    next_id: AtomicU64,
}

impl ServerConnection {
    /// Run the MCP handshake over `transport` and fetch the tool catalog.
    pub async fn establish(
        name: impl Into<String>,
        target: ConnectionTarget,
        transport: Arc<dyn Transport>,
    ) -> McpResult<Self> {
        let name = name.into();
        let next_id = AtomicU64::new(1);

        let request = JsonRpcRequest::new(
            next_id.fetch_add(1, Ordering::SeqCst),
            METHOD_INITIALIZE,
            Some(serde_json::to_value(InitializeParams::default())?),
        );
        let response = exchange(transport.as_ref(), request).await?;
        if let Some(error) = response.error {
            return Err(McpError::InitializationFailed(error.message));
        }
        let server_info: InitializeResult = serde_json::from_value(
            response
                .result
                .ok_or_else(|| McpError::protocol_error("Missing initialize result"))?,
        )
        .map_err(|e| McpError::protocol_error(e.to_string()))?;

        debug!(
            server = %name,
            protocol_version = %server_info.protocol_version,
            server_name = %server_info.server_info.name,
            "MCP server initialized"
        );

        transport
            .notify(JsonRpcNotification::new(METHOD_INITIALIZED, None))
            .await?;

        let request = JsonRpcRequest::new(next_id.fetch_add(1, Ordering::SeqCst), METHOD_TOOLS_LIST, None);
        let response = exchange(transport.as_ref(), request).await?;
        let tools = match response.error {
            Some(error) => {
                warn!(server = %name, code = error.code, message = %error.message, "Failed to list tools");
                Vec::new()
            }
            None => {
                let listed: ListToolsResult = serde_json::from_value(
                    response
                        .result
                        .ok_or_else(|| McpError::protocol_error("Missing tools/list result"))?,
                )
                .map_err(|e| McpError::protocol_error(e.to_string()))?;
                listed.tools
            }
        };
        info!(server = %name, tool_count = tools.len(), "Connected to MCP server");

        Ok(Self {
            name,
            target,
            transport,
            server_info,
            tools,
            next_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    /// Catalog fetched at connect time.
    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallResult> {
        debug!(tool = name, server = %self.name, "Calling MCP tool");
        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let request = JsonRpcRequest::new(
            self.next_id.fetch_add(1, Ordering::SeqCst),
            METHOD_TOOLS_CALL,
            Some(serde_json::to_value(&params)?),
        );

        let response = exchange(self.transport.as_ref(), request).await?;
        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(
            response
                .result
                .ok_or_else(|| McpError::protocol_error("Missing tools/call result"))?,
        )
        .map_err(|e| McpError::protocol_error(e.to_string()))
    }

    pub async fn close(&self) -> McpResult<()> {
        self.transport.close().await
    }
}

/// Send `request` and check that the answer belongs to it.
async fn exchange(transport: &dyn Transport, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
    let id = request.id.clone();
    let response = transport.request(request).await?;
    if response.id.is_some() && response.id != id {
        return Err(McpError::protocol_error(format!(
            "response id {:?} does not match request id {:?}",
            response.id, id
        )));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mattermost_mcp_test_utils::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_handshake_fetches_tools_once() {
        let mock = MockTransport::new("alpha").with_tool("search").with_tool("read");
        let conn = ServerConnection::establish(
            "alpha",
            ConnectionTarget::Remote {
                url: "https://alpha.example/mcp".to_string(),
            },
            Arc::new(mock.clone()),
        )
        .await
        .unwrap();

        assert_eq!(conn.tools().len(), 2);
        assert!(conn.has_tool("search"));
        assert_eq!(conn.server_info().server_info.name, "alpha");
        assert_eq!(
            mock.methods(),
            vec!["initialize", "notifications/initialized", "tools/list"]
        );

        let result = conn.call_tool("search", json!({"q": "x"})).await.unwrap();
        assert_eq!(result.text_content(), "search handled by alpha");
        assert_eq!(mock.method_count("tools/list"), 1);
    }

    #[tokio::test]
    async fn test_embedded_target_is_kept() {
        let mock = MockTransport::new("alpha");
        let conn = ServerConnection::establish(
            "alpha",
            ConnectionTarget::Embedded {
                session_id: "s1".to_string(),
            },
            Arc::new(mock),
        )
        .await
        .unwrap();
        assert!(conn.tools().is_empty());
        assert!(matches!(
            conn.target(),
            ConnectionTarget::Embedded { session_id } if session_id == "s1"
        ));
    }

    /// Answers every request with a fixed id.
    struct FixedIdTransport(MockTransport);

    #[async_trait::async_trait]
    impl Transport for FixedIdTransport {
        async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
            let mut response = self.0.request(request).await?;
            response.id = Some(1u64.into());
            Ok(response)
        }

        async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
            self.0.notify(notification).await
        }

        async fn close(&self) -> McpResult<()> {
            self.0.close().await
        }

        fn is_connected(&self) -> bool {
            self.0.is_connected()
        }
    }

    #[tokio::test]
    async fn test_mismatched_response_id_is_rejected() {
        let transport = FixedIdTransport(MockTransport::new("alpha").with_tool("search"));
        let err = ServerConnection::establish(
            "alpha",
            ConnectionTarget::Remote {
                url: "https://alpha.example/mcp".to_string(),
            },
            Arc::new(transport),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, McpError::ProtocolError(_)));
        assert!(err.to_string().contains("does not match request id"));
    }
}
