//! Testing utilities, fixtures, and mocks for mattermost-mcp.
//!
//! - **Fixtures**: ready-made users, posts, channels and teams
//! - **Mattermost**: a recording [`MockMattermostClient`] and its factory
//! - **Transport**: a scripted MCP [`MockTransport`] for connection tests
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use mattermost_mcp_test_utils::{fixtures, MockMattermostClient};
//!
//! #[tokio::test]
//! async fn test_read_post() {
//!     let client = MockMattermostClient::new()
//!         .with_post(fixtures::post("p1", "c1", "hello"));
//!
//!     let post = client.get_post("p1").await.unwrap();
//!     assert_eq!(post.message, "hello");
//!     assert_eq!(client.call_count("get_post"), 1);
//! }
//! ```

pub mod fixtures;
pub mod mattermost;
pub mod transport;

pub use mattermost::{MockClientFactory, MockMattermostClient};
pub use transport::MockTransport;
