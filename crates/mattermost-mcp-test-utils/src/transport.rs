//! Scripted MCP transport.

use async_trait::async_trait;
use mattermost_mcp_protocol::{
    InitializeResult, Implementation, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, McpError, McpResult, McpTool, ServerCapabilities, ToolCallResult, Transport,
    LATEST_PROTOCOL_VERSION,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A [`Transport`] that answers like a small MCP server.
///
/// `tools/call` returns the configured result for the tool, or a text
/// result naming the server. Clones share state.
#[derive(Clone)]
pub struct MockTransport {
    server_name: String,
    tools: Arc<Mutex<Vec<McpTool>>>,
    results: Arc<Mutex<HashMap<String, ToolCallResult>>>,
    methods: Arc<Mutex<Vec<String>>>,
    closed_failures: Arc<AtomicUsize>,
    connected: Arc<AtomicBool>,
    close_fails: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            tools: Arc::new(Mutex::new(Vec::new())),
            results: Arc::new(Mutex::new(HashMap::new())),
            methods: Arc::new(Mutex::new(Vec::new())),
            closed_failures: Arc::new(AtomicUsize::new(0)),
            connected: Arc::new(AtomicBool::new(true)),
            close_fails: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Advertise a tool with an empty object schema.
    pub fn with_tool(self, name: &str) -> Self {
        self.tools.lock().unwrap().push(McpTool {
            name: name.to_string(),
            description: Some(format!("{} from {}", name, self.server_name)),
            input_schema: Some(json!({"type": "object", "properties": {}})),
        });
        self
    }

    pub fn with_result(self, tool: &str, result: ToolCallResult) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(tool.to_string(), result);
        self
    }

    /// Fail the next `n` tool calls with [`McpError::ConnectionClosed`].
    pub fn fail_next_calls_with_closed(&self, n: usize) {
        self.closed_failures.store(n, Ordering::SeqCst);
    }

    /// Make `close` return an error.
    pub fn fail_on_close(self) -> Self {
        self.close_fails.store(true, Ordering::SeqCst);
        self
    }

    /// Methods received, in order. Notifications included.
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    pub fn method_count(&self, method: &str) -> usize {
        self.methods
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    fn answer(&self, request: &JsonRpcRequest) -> McpResult<serde_json::Value> {
        match request.method.as_str() {
            "initialize" => Ok(serde_json::to_value(InitializeResult {
                protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities::with_tools(),
                server_info: Implementation {
                    name: self.server_name.clone(),
                    version: "test".to_string(),
                },
                instructions: None,
            })?),
            "tools/list" => Ok(serde_json::to_value(ListToolsResult {
                tools: self.tools.lock().unwrap().clone(),
            })?),
            "tools/call" => {
                let pending = self.closed_failures.load(Ordering::SeqCst);
                if pending > 0 {
                    self.closed_failures.store(pending - 1, Ordering::SeqCst);
                    return Err(McpError::ConnectionClosed);
                }
                let name = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string();
                let result = self
                    .results
                    .lock()
                    .unwrap()
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| {
                        ToolCallResult::text(format!("{} handled by {}", name, self.server_name))
                    });
                Ok(serde_json::to_value(result)?)
            }
            "ping" => Ok(json!({})),
            other => Err(McpError::Rpc {
                code: -32601,
                message: format!("Method not found: {}", other),
            }),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        self.methods.lock().unwrap().push(request.method.clone());
        if !self.is_connected() {
            return Err(McpError::ConnectionClosed);
        }
        let result = self.answer(&request)?;
        Ok(JsonRpcResponse::success(request.id, result))
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        self.methods.lock().unwrap().push(notification.method);
        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if self.close_fails.load(Ordering::SeqCst) {
            return Err(McpError::connection_failed("close failed"));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
