//! Tool registry and the Mattermost tool catalog.
//!
//! Every tool declares its arguments once, as a struct plus a static field
//! table ([`access::FieldSpec`]). The registry derives per-mode schemas from
//! that table, enforces field-level access before dispatch, bounds each call
//! with a timeout, and folds failures into `isError` results.

pub mod access;
pub mod catalog;
pub mod context;
pub mod error;
pub mod registry;

pub use access::{bind, schema_for, FieldKind, FieldSpec, ToolArgs, LOCAL_ONLY};
pub use context::{ToolContext, AI_GENERATED_PROP};
pub use error::{ToolError, ToolResult};
pub use registry::{Tool, ToolDefinition, ToolRegistry, DEFAULT_TOOL_TIMEOUT};
