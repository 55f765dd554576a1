//! Streamable HTTP transport for remote MCP servers.
//!
//! Each JSON-RPC message is one POST. The response is plain JSON or an SSE
//! stream carrying the JSON-RPC response as a `data:` line.

use crate::challenge::resource_metadata_param;
use async_trait::async_trait;
use mattermost_mcp_protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpError, McpResult, Transport,
};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

const SESSION_HEADER: &str = "mcp-session-id";

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// The MCP endpoint (e.g., `https://mcp.example.com/mcp`)
    pub url: String,
    /// OAuth bearer token
    pub auth_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: None,
            timeout_secs: 60,
        }
    }
}

/// HTTP transport for remote MCP servers.
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: Client,
    /// Set after the first successful exchange.
    connected: AtomicBool,
    closed: AtomicBool,
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> McpResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| McpError::connection_failed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            session_id: RwLock::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    async fn post(&self, body: String) -> McpResult<reqwest::Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionClosed);
        }

        let mut req = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(body);

        if let Some(ref token) = self.config.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(ref id) = *self.session_id.read().await {
            req = req.header(SESSION_HEADER, id);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                McpError::Timeout
            } else if e.is_connect() && self.connected.load(Ordering::SeqCst) {
                // A peer that answered before and now refuses is gone.
                McpError::ConnectionClosed
            } else if e.is_connect() {
                McpError::connection_failed(format!("Connection failed: {e}"))
            } else {
                McpError::protocol_error(format!("Request failed: {e}"))
            }
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let resource_metadata = response
                .headers()
                .get("www-authenticate")
                .and_then(|v| v.to_str().ok())
                .and_then(resource_metadata_param);
            debug!(url = %self.config.url, ?resource_metadata, "Server requires authorization");
            return Err(McpError::auth_required(resource_metadata));
        }

        if let Some(id) = response.headers().get(SESSION_HEADER) {
            if let Ok(id) = id.to_str() {
                *self.session_id.write().await = Some(id.to_string());
            }
        }

        Ok(response)
    }

    async fn parse_response(&self, response: reqwest::Response) -> McpResult<JsonRpcResponse> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(McpError::protocol_error(format!(
                "Server returned {status}: {text}"
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            self.parse_sse_stream(response).await
        } else {
            let text = response
                .text()
                .await
                .map_err(|e| McpError::protocol_error(format!("Failed to read response: {e}")))?;
            serde_json::from_str(&text)
                .map_err(|e| McpError::protocol_error(format!("Invalid JSON response: {e}")))
        }
    }

    async fn parse_sse_stream(&self, response: reqwest::Response) -> McpResult<JsonRpcResponse> {
        use futures::StreamExt;

        let mut stream = response.bytes_stream();
        // Raw bytes: a chunk may end inside a multi-byte character.
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| McpError::protocol_error(format!("Stream error: {e}")))?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                if let Some(response) = parse_data_line(&line) {
                    return Ok(response);
                }
            }
        }

        if let Some(response) = parse_data_line(&buffer) {
            return Ok(response);
        }
        Err(McpError::protocol_error("SSE stream ended without response"))
    }
}

/// Decode one complete SSE line and parse its `data:` payload.
fn parse_data_line(line: &[u8]) -> Option<JsonRpcResponse> {
    let line = std::str::from_utf8(line).ok()?;
    let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?;
    serde_json::from_str(data.trim_start()).ok()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let body = serde_json::to_string(&request)?;
        debug!(id = ?request.id, method = %request.method, url = %self.config.url, "Sending MCP request");

        let response = self.post(body).await?;
        let parsed = self.parse_response(response).await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(parsed)
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        let body = serde_json::to_string(&notification)?;
        debug!(method = %notification.method, "Sending MCP notification");

        let response = self.post(body).await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Notification returned non-success status");
        }
        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        debug!(url = %self.config.url, "Closed HTTP transport");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connected.load(Ordering::SeqCst)
    }
}
