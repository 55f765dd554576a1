//! MCP error types.

use thiserror::Error;

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Tool not found.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer went away. Callers may reconnect once and retry.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol error.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The peer answered with a JSON-RPC error.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server timeout.
    #[error("Server timeout")]
    Timeout,

    /// Server initialization failed.
    #[error("Server initialization failed: {0}")]
    InitializationFailed(String),

    /// The server answered with an authorization challenge.
    ///
    /// The display text carries the `resource_metadata="<url>"` marker so the
    /// URL survives being flattened into a string by an outer error.
    #[error("Authentication required{}", metadata_marker(.resource_metadata))]
    AuthRequired { resource_metadata: Option<String> },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

fn metadata_marker(resource_metadata: &Option<String>) -> String {
    match resource_metadata {
        Some(url) => format!(": resource_metadata=\"{}\"", url),
        None => String::new(),
    }
}

impl McpError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError(message.into())
    }

    pub fn auth_required(resource_metadata: Option<String>) -> Self {
        Self::AuthRequired { resource_metadata }
    }

    /// Whether a reconnect may fix the failure.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, McpError::ConnectionClosed)
    }
}
