//! Minimal JSON-RPC 2.0 and MCP message types.
//!
//! Only the messages needed to wire authentication and tool dispatch are
//! modelled: `initialize`, `notifications/initialized`, `ping`, `tools/list`
//! and `tools/call`.

pub mod error;
pub mod protocol;
pub mod transport;

pub use error::{McpError, McpResult};
pub use protocol::*;
pub use transport::Transport;
