//! The Mattermost tool catalog.
//!
//! Handlers are thin: bind arguments, make one or a few client calls, and
//! render the result as text for a language model.

mod attachments;
pub mod channels;
pub mod dev;
pub mod posts;
pub mod teams;
pub mod users;

use crate::error::ToolResult;
use crate::registry::ToolRegistry;
use chrono::{DateTime, Utc};
use mattermost_mcp_core::{MattermostClient, Post};
use std::collections::HashMap;
use tracing::error;

/// Register every catalog tool, dev-only ones included.
pub fn register_all(registry: &mut ToolRegistry) {
    let results: Vec<ToolResult<()>> = vec![
        registry.register(posts::ReadPost),
        registry.register(posts::ReadChannel),
        registry.register(posts::SearchPosts),
        registry.register(posts::CreatePost),
        registry.register(posts::DirectMessage),
        registry.register(posts::GroupMessage),
        registry.register(channels::CreateChannel),
        registry.register(channels::GetChannelInfo),
        registry.register(channels::GetChannelMembers),
        registry.register(channels::AddUserToChannel),
        registry.register(teams::GetTeamInfo),
        registry.register(teams::GetTeamMembers),
        registry.register(teams::AddUserToTeam),
        registry.register(users::SearchUsers),
        registry.register(users::GetUserChannels),
        registry.register(dev::CreateUser),
        registry.register(dev::CreatePostAsUser),
        registry.register(dev::CreateTeam),
    ];
    for result in results {
        if let Err(e) = result {
            error!(error = %e, "Failed to register catalog tool");
        }
    }
}

pub(crate) fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Map user ids to usernames. Lookups that fail fall back to the id.
pub(crate) async fn usernames(client: &dyn MattermostClient, ids: &[String]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for id in ids {
        if id.is_empty() || names.contains_key(id) {
            continue;
        }
        let name = match client.get_user(id).await {
            Ok(user) => user.username,
            Err(_) => id.to_string(),
        };
        names.insert(id.clone(), name);
    }
    names
}

pub(crate) fn format_post(post: &Post, names: &HashMap<String, String>) -> String {
    let author = names
        .get(&post.user_id)
        .map(String::as_str)
        .unwrap_or(post.user_id.as_str());
    let mut line = format!(
        "[{}] @{}: {}",
        format_timestamp(post.create_at),
        author,
        post.message
    );
    line.push_str(&format!(" (post_id: {}", post.id));
    if !post.root_id.is_empty() {
        line.push_str(&format!(", reply to: {}", post.root_id));
    }
    if !post.file_ids.is_empty() {
        line.push_str(&format!(", {} attachment(s)", post.file_ids.len()));
    }
    line.push(')');
    line
}

/// Clamp an optional page size into `1..=max`.
pub(crate) fn page_size(value: Option<u32>, default: u32, max: u32) -> u32 {
    value.unwrap_or(default).clamp(1, max)
}
