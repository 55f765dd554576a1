//! Tool error types.

use mattermost_mcp_core::{AccessMode, ApiError};
use thiserror::Error;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while binding or running a tool.
///
/// None of these are transport faults: the registry turns every one of them
/// into a tool result with `isError` set.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid parameters.
    #[error("{0}")]
    Validation(String),

    /// A field was supplied that the current access mode does not allow.
    #[error("field '{field}' is not available in {mode} access mode")]
    AccessDenied { field: String, mode: AccessMode },

    /// No tool with that name is registered.
    #[error("unknown tool '{0}'")]
    NotFound(String),

    /// Development tool invoked while dev mode is off.
    #[error("tool '{0}' is a development tool and is not available in production mode")]
    DevOnly(String),

    /// Execution failed.
    #[error("{0}")]
    Execution(String),

    /// The call did not finish in time.
    #[error("tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// Mattermost rejected or failed the request.
    #[error("Mattermost API error: {0}")]
    Api(#[from] ApiError),
}

impl ToolError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Validation error for a specific tool's arguments.
    pub fn invalid_arguments(tool: &str, detail: impl std::fmt::Display) -> Self {
        Self::Validation(format!("invalid arguments for tool '{}': {}", tool, detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                ToolError::AccessDenied {
                    field: "attachments".to_string(),
                    mode: AccessMode::Remote,
                },
                "field 'attachments' is not available in remote access mode",
            ),
            (
                ToolError::Timeout {
                    tool: "search_posts".to_string(),
                    secs: 30,
                },
                "tool 'search_posts' timed out after 30s",
            ),
            (
                ToolError::DevOnly("create_user".to_string()),
                "tool 'create_user' is a development tool and is not available in production mode",
            ),
            (
                ToolError::invalid_arguments("read_post", "missing required field 'post_id'"),
                "invalid arguments for tool 'read_post': missing required field 'post_id'",
            ),
            (ToolError::NotFound("nope".to_string()), "unknown tool 'nope'"),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_from_api_error() {
        let err: ToolError = ApiError::NotFound("post p1 not found".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Mattermost API error: not found: post p1 not found"
        );
    }
}
