//! Tool registry.

use crate::access::{bind, schema_for, FieldSpec, ToolArgs};
use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use async_trait::async_trait;
use mattermost_mcp_core::AccessMode;
use mattermost_mcp_protocol::{McpTool, ToolCallResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A catalog operation with typed arguments.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: ToolArgs;

    fn name(&self) -> &'static str;

    /// Description shown to the model.
    fn description(&self) -> &'static str;

    /// Hidden and refused unless the registry runs in dev mode.
    fn dev_only(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &ToolContext, args: Self::Args) -> ToolResult<String>;
}

/// Object-safe view of a [`Tool`], binding raw arguments before dispatch.
#[async_trait]
pub trait ToolDefinition: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn dev_only(&self) -> bool;
    fn fields(&self) -> &'static [FieldSpec];
    async fn call(&self, ctx: &ToolContext, raw: Option<Value>) -> ToolResult<String>;
}

#[async_trait]
impl<T: Tool> ToolDefinition for T {
    fn name(&self) -> &'static str {
        Tool::name(self)
    }

    fn description(&self) -> &'static str {
        Tool::description(self)
    }

    fn dev_only(&self) -> bool {
        Tool::dev_only(self)
    }

    fn fields(&self) -> &'static [FieldSpec] {
        T::Args::FIELDS
    }

    async fn call(&self, ctx: &ToolContext, raw: Option<Value>) -> ToolResult<String> {
        let args = bind::<T::Args>(Tool::name(self), raw, ctx.access_mode)?;
        self.run(ctx, args).await
    }
}

/// Registry of available tools, in registration order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolDefinition>>,
    index: HashMap<&'static str, usize>,
    dev_mode: bool,
    timeout: Duration,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new(dev_mode: bool) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            dev_mode,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Create a registry with the full Mattermost catalog.
    pub fn with_catalog(dev_mode: bool) -> Self {
        let mut registry = Self::new(dev_mode);
        crate::catalog::register_all(&mut registry);
        registry
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a tool. A second tool with the same name is refused.
    pub fn register<T: Tool>(&mut self, tool: T) -> ToolResult<()> {
        self.register_definition(Arc::new(tool))
    }

    pub fn register_definition(&mut self, tool: Arc<dyn ToolDefinition>) -> ToolResult<()> {
        let name = tool.name();
        if self.index.contains_key(name) {
            return Err(ToolError::validation(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDefinition>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Every registered name, dev-only tools included.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Descriptors advertised to a caller under `mode`.
    pub fn list_tools(&self, mode: AccessMode) -> Vec<McpTool> {
        self.tools
            .iter()
            .filter(|t| self.dev_mode || !t.dev_only())
            .map(|t| McpTool {
                name: t.name().to_string(),
                description: Some(t.description().to_string()),
                input_schema: Some(schema_for(t.fields(), mode)),
            })
            .collect()
    }

    /// Run a tool under the registry's timeout.
    pub async fn call(&self, name: &str, raw: Option<Value>, ctx: &ToolContext) -> ToolResult<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        if tool.dev_only() && !self.dev_mode {
            return Err(ToolError::DevOnly(name.to_string()));
        }

        debug!(tool = %name, mode = %ctx.access_mode, "Calling tool");
        match tokio::time::timeout(self.timeout, tool.call(ctx, raw)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: name.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Run a tool and fold any failure into an `isError` result.
    pub async fn execute(&self, name: &str, raw: Option<Value>, ctx: &ToolContext) -> ToolCallResult {
        match self.call(name, raw, ctx).await {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                ToolCallResult::error(e.to_string())
            }
        }
    }
}
