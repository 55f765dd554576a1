//! User tools.

use super::page_size;
use crate::access::{FieldKind, FieldSpec, ToolArgs};
use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use async_trait::async_trait;
use mattermost_mcp_core::User;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const DEFAULT_USER_RESULTS: u32 = 20;
const MAX_USER_RESULTS: u32 = 100;

fn describe_user(user: &User) -> String {
    let mut line = format!("- @{} ({})", user.username, user.display_name());
    let _ = write!(line, " ID: {}", user.id);
    if !user.email.is_empty() {
        let _ = write!(line, ", email: {}", user.email);
    }
    if !user.position.is_empty() {
        let _ = write!(line, ", position: {}", user.position);
    }
    if user.is_bot {
        line.push_str(" [bot]");
    }
    line
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchUsersArgs {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ToolArgs for SearchUsersArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required(
            "term",
            FieldKind::String,
            "Part of a username, full name, nickname or email",
        ),
        FieldSpec::optional(
            "limit",
            FieldKind::Integer,
            "Maximum number of results (default 20, max 100)",
        ),
    ];
}

pub struct SearchUsers;

#[async_trait]
impl Tool for SearchUsers {
    type Args = SearchUsersArgs;

    fn name(&self) -> &'static str {
        "search_users"
    }

    fn description(&self) -> &'static str {
        "Search users by username, name or email."
    }

    async fn run(&self, ctx: &ToolContext, args: SearchUsersArgs) -> ToolResult<String> {
        let term = args.term.trim().trim_start_matches('@');
        if term.is_empty() {
            return Err(ToolError::validation("term must not be empty"));
        }
        let limit = page_size(args.limit, DEFAULT_USER_RESULTS, MAX_USER_RESULTS);

        let users = ctx.client.search_users(term, limit).await?;
        let users: Vec<&User> = users.iter().filter(|u| u.delete_at == 0).collect();
        if users.is_empty() {
            return Ok(format!("No users found matching '{}'.", term));
        }

        let lines: Vec<String> = users.iter().map(|u| describe_user(u)).collect();
        Ok(format!(
            "Found {} users matching '{}':\n{}",
            users.len(),
            term,
            lines.join("\n")
        ))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetUserChannelsArgs {
    pub team_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ToolArgs for GetUserChannelsArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("team_id", FieldKind::String, "ID of the team"),
        FieldSpec::optional(
            "user_id",
            FieldKind::String,
            "ID of the user (defaults to the authenticated user)",
        ),
    ];
}

pub struct GetUserChannels;

#[async_trait]
impl Tool for GetUserChannels {
    type Args = GetUserChannelsArgs;

    fn name(&self) -> &'static str {
        "get_user_channels"
    }

    fn description(&self) -> &'static str {
        "List the channels a user belongs to in a team."
    }

    async fn run(&self, ctx: &ToolContext, args: GetUserChannelsArgs) -> ToolResult<String> {
        let user_id = match args.user_id {
            Some(id) => id,
            None => ctx.client.get_me().await?.id,
        };

        let channels = ctx
            .client
            .get_channels_for_user(&user_id, &args.team_id)
            .await?;
        if channels.is_empty() {
            return Ok(format!(
                "User {} has no channels in team {}.",
                user_id, args.team_id
            ));
        }

        let mut out = format!(
            "User {} belongs to {} channels in team {}:",
            user_id,
            channels.len(),
            args.team_id
        );
        for channel in &channels {
            let name = if channel.display_name.is_empty() {
                &channel.name
            } else {
                &channel.display_name
            };
            let _ = write!(
                out,
                "\n- {} (~{}, {}, ID: {})",
                name, channel.name, channel.channel_type, channel.id
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;
    use mattermost_mcp_core::AccessMode;
    use mattermost_mcp_test_utils::{fixtures, MockMattermostClient};
    use serde_json::json;
    use std::sync::Arc;

    async fn call(client: &MockMattermostClient, tool: &str, args: serde_json::Value) -> (bool, String) {
        let ctx = ToolContext::new(Arc::new(client.clone()), AccessMode::Remote, reqwest::Client::new());
        let result = ToolRegistry::with_catalog(false)
            .execute(tool, Some(args), &ctx)
            .await;
        (result.is_error, result.text_content())
    }

    #[tokio::test]
    async fn test_search_users() {
        let mut gone = fixtures::user("u3", "alfred");
        gone.delete_at = 1;
        let client = MockMattermostClient::new()
            .with_user(fixtures::user("u1", "alice"))
            .with_user(fixtures::bot("u2", "alert-bot"))
            .with_user(gone)
            .with_user(fixtures::user("u4", "bob"));

        let (is_error, text) = call(&client, "search_users", json!({"term": "@al"})).await;
        assert!(!is_error, "{}", text);
        assert!(text.starts_with("Found 2 users matching 'al'"));
        assert!(text.contains("@alert-bot"));
        assert!(text.contains("[bot]"));
        assert!(!text.contains("alfred"));

        let (_, text) = call(&client, "search_users", json!({"term": "zzz"})).await;
        assert_eq!(text, "No users found matching 'zzz'.");
    }

    #[tokio::test]
    async fn test_user_channels_defaults_to_me() {
        let client = MockMattermostClient::new()
            .with_me(fixtures::user("me", "alice"))
            .with_channel(fixtures::channel("c1", "t1", "town-square"))
            .with_channel(fixtures::channel("c2", "t2", "elsewhere"));

        let (_, text) = call(&client, "get_user_channels", json!({"team_id": "t1"})).await;
        assert!(text.starts_with("User me belongs to 1 channels in team t1"));
        assert!(text.contains("~town-square"));
        assert_eq!(client.call_count("get_me"), 1);

        let (_, text) = call(
            &client,
            "get_user_channels",
            json!({"team_id": "t9", "user_id": "u5"}),
        )
        .await;
        assert_eq!(text, "User u5 has no channels in team t9.");
        assert_eq!(client.call_count("get_me"), 1);
    }
}
