//! Context handed to every tool call.

use crate::error::ToolResult;
use mattermost_mcp_core::{AccessMode, MattermostClient};
use std::sync::Arc;

/// Post prop carrying the id of the bot or user that produced a post.
pub const AI_GENERATED_PROP: &str = "ai_generated_by";

/// Everything a handler may use. Handlers keep no state of their own.
#[derive(Clone)]
pub struct ToolContext {
    /// Client acting with the caller's credentials.
    pub client: Arc<dyn MattermostClient>,
    /// Access mode of the transport the call arrived on.
    pub access_mode: AccessMode,
    /// Tag created posts with the author id.
    pub track_ai_generated: bool,
    /// HTTP client for fetching attachment URLs, shared across calls.
    pub http: reqwest::Client,
}

impl ToolContext {
    pub fn new(client: Arc<dyn MattermostClient>, access_mode: AccessMode, http: reqwest::Client) -> Self {
        Self {
            client,
            access_mode,
            track_ai_generated: false,
            http,
        }
    }

    pub fn with_tracking(mut self, track_ai_generated: bool) -> Self {
        self.track_ai_generated = track_ai_generated;
        self
    }

    /// Id of the originating bot or user when attribution tracking is on.
    pub async fn attribution_id(&self) -> ToolResult<Option<String>> {
        if !self.track_ai_generated {
            return Ok(None);
        }
        let me = self.client.get_me().await?;
        Ok(Some(me.id))
    }
}
