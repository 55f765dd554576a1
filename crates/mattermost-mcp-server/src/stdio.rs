//! Newline-delimited JSON-RPC over standard I/O.
//!
//! Stdout carries protocol frames only. Nothing else may write to it while
//! the server runs.

use crate::error::{ServerError, ServerResult};
use crate::session::{McpSession, ToolServer};
use futures::{SinkExt, StreamExt};
use mattermost_mcp_auth::AuthContext;
use mattermost_mcp_core::AccessMode;
use mattermost_mcp_protocol::{error_codes, JsonRpcResponse};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

/// Longest accepted frame.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Lifecycle of a [`StdioServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioState {
    Unstarted,
    Validating,
    Serving,
    Stopped,
}

/// Serves one long-lived peer with a fixed personal access token.
pub struct StdioServer {
    server: Arc<ToolServer>,
    auth: AuthContext,
    state: StdioState,
}

impl StdioServer {
    pub fn new(server: Arc<ToolServer>, token: impl Into<String>) -> Self {
        Self {
            server,
            auth: AuthContext::Pat(token.into()),
            state: StdioState::Unstarted,
        }
    }

    pub fn state(&self) -> StdioState {
        self.state
    }

    /// Serve stdin/stdout until EOF.
    pub async fn run(&mut self) -> ServerResult<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Validate the token, then answer frames from `reader` on `writer`
    /// until EOF.
    pub async fn serve<R, W>(&mut self, reader: R, writer: W) -> ServerResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.state = StdioState::Validating;
        if let Err(e) = self.server.provider().validate_auth(&self.auth).await {
            error!(error = %e, "Startup token validation failed");
            self.state = StdioState::Stopped;
            return Err(ServerError::StartupValidation(e));
        }

        self.state = StdioState::Serving;
        info!("Serving MCP over stdio");
        let result = self.serve_frames(reader, writer).await;
        self.state = StdioState::Stopped;
        debug!("Stdio session ended");
        result
    }

    async fn serve_frames<R, W>(&self, reader: R, writer: W) -> ServerResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let session = McpSession::new(self.server.clone(), self.auth.clone(), AccessMode::Local);
        let mut frames = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
        let mut out = FramedWrite::new(writer, LinesCodec::new());

        while let Some(frame) = frames.next().await {
            let response = match frame {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => session.handle_message(&line).await,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(limit = MAX_FRAME_BYTES, "Dropping oversized frame");
                    Some(JsonRpcResponse::error(
                        None,
                        error_codes::INVALID_REQUEST,
                        "message too large",
                    ))
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(response) = response {
                out.send(serde_json::to_string(&response)?).await?;
            }
        }
        Ok(())
    }
}
