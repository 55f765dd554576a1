//! Post tools: reading, searching and writing messages.

use super::attachments::{self, MAX_ATTACHMENTS};
use super::{format_post, page_size, usernames};
use crate::access::{FieldKind, FieldSpec, ToolArgs, LOCAL_ONLY};
use crate::context::{ToolContext, AI_GENERATED_PROP};
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use async_trait::async_trait;
use chrono::DateTime;
use mattermost_mcp_core::{NewPost, Post, PostList};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use tracing::info;

const DEFAULT_CHANNEL_POSTS: u32 = 20;
const MAX_CHANNEL_POSTS: u32 = 200;
const DEFAULT_SEARCH_RESULTS: u32 = 20;
const MAX_SEARCH_RESULTS: u32 = 100;

/// Build a post, attaching the attribution prop when tracking is enabled.
async fn new_post(
    ctx: &ToolContext,
    channel_id: &str,
    message: &str,
    root_id: Option<&str>,
) -> ToolResult<NewPost> {
    let mut post = NewPost::new(channel_id, message);
    if let Some(root_id) = root_id {
        post.root_id = root_id.to_string();
    }
    if let Some(author) = ctx.attribution_id().await? {
        post.props.insert(AI_GENERATED_PROP.to_string(), json!(author));
    }
    Ok(post)
}

async fn render_posts(ctx: &ToolContext, posts: &[&Post]) -> String {
    let ids: Vec<String> = posts.iter().map(|p| p.user_id.clone()).collect();
    let names = usernames(ctx.client.as_ref(), &ids).await;
    posts
        .iter()
        .map(|p| format_post(p, &names))
        .collect::<Vec<_>>()
        .join("\n")
}

fn chronological(list: &PostList) -> Vec<&Post> {
    let mut posts = list.ordered();
    posts.sort_by_key(|p| p.create_at);
    posts
}

// read_post

#[derive(Debug, Deserialize, Serialize)]
pub struct ReadPostArgs {
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_thread: Option<bool>,
}

impl ToolArgs for ReadPostArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("post_id", FieldKind::String, "ID of the post to read"),
        FieldSpec::optional(
            "include_thread",
            FieldKind::Boolean,
            "Also return every post in the thread (default false)",
        ),
    ];
}

pub struct ReadPost;

#[async_trait]
impl Tool for ReadPost {
    type Args = ReadPostArgs;

    fn name(&self) -> &'static str {
        "read_post"
    }

    fn description(&self) -> &'static str {
        "Read a single post by ID, optionally with its whole thread."
    }

    async fn run(&self, ctx: &ToolContext, args: ReadPostArgs) -> ToolResult<String> {
        if args.include_thread.unwrap_or(false) {
            let thread = ctx.client.get_post_thread(&args.post_id).await?;
            let posts = chronological(&thread);
            let body = render_posts(ctx, &posts).await;
            return Ok(format!(
                "Thread containing post {} ({} posts):\n{}",
                args.post_id,
                posts.len(),
                body
            ));
        }

        let post = ctx.client.get_post(&args.post_id).await?;
        Ok(render_posts(ctx, &[&post]).await)
    }
}

// read_channel

#[derive(Debug, Deserialize, Serialize)]
pub struct ReadChannelArgs {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

impl ToolArgs for ReadChannelArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("channel_id", FieldKind::String, "ID of the channel to read"),
        FieldSpec::optional(
            "limit",
            FieldKind::Integer,
            "Number of posts to return (default 20, max 200)",
        ),
        FieldSpec::optional(
            "since",
            FieldKind::String,
            "Only posts created at or after this RFC 3339 timestamp",
        ),
    ];
}

fn parse_since(since: &str) -> ToolResult<i64> {
    DateTime::parse_from_rfc3339(since.trim())
        .map(|t| t.timestamp_millis())
        .map_err(|e| {
            ToolError::validation(format!(
                "invalid 'since' timestamp '{}': {} (expected RFC 3339, e.g. 2024-01-31T09:00:00Z)",
                since, e
            ))
        })
}

pub struct ReadChannel;

#[async_trait]
impl Tool for ReadChannel {
    type Args = ReadChannelArgs;

    fn name(&self) -> &'static str {
        "read_channel"
    }

    fn description(&self) -> &'static str {
        "Read the most recent posts of a channel, oldest first."
    }

    async fn run(&self, ctx: &ToolContext, args: ReadChannelArgs) -> ToolResult<String> {
        let limit = page_size(args.limit, DEFAULT_CHANNEL_POSTS, MAX_CHANNEL_POSTS);
        let since = args.since.as_deref().map(parse_since).transpose()?;

        let list = ctx
            .client
            .get_posts_for_channel(&args.channel_id, limit, since)
            .await?;
        if list.is_empty() {
            return Ok(format!("No posts found in channel {}.", args.channel_id));
        }

        let posts = chronological(&list);
        let body = render_posts(ctx, &posts).await;
        Ok(format!(
            "{} posts from channel {}:\n{}",
            posts.len(),
            args.channel_id,
            body
        ))
    }
}

// search_posts

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchPostsArgs {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ToolArgs for SearchPostsArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required(
            "query",
            FieldKind::String,
            "Search terms (Mattermost search syntax, e.g. from:alice in:town-square)",
        ),
        FieldSpec::optional("team_id", FieldKind::String, "Restrict the search to a team"),
        FieldSpec::optional(
            "channel_id",
            FieldKind::String,
            "Only return results from this channel",
        ),
        FieldSpec::optional(
            "limit",
            FieldKind::Integer,
            "Maximum number of results (default 20, max 100)",
        ),
    ];
}

pub struct SearchPosts;

#[async_trait]
impl Tool for SearchPosts {
    type Args = SearchPostsArgs;

    fn name(&self) -> &'static str {
        "search_posts"
    }

    fn description(&self) -> &'static str {
        "Search posts by keywords, optionally within a team or channel."
    }

    async fn run(&self, ctx: &ToolContext, args: SearchPostsArgs) -> ToolResult<String> {
        if args.query.trim().is_empty() {
            return Err(ToolError::validation("query must not be empty"));
        }
        let limit = page_size(args.limit, DEFAULT_SEARCH_RESULTS, MAX_SEARCH_RESULTS) as usize;

        let results = ctx
            .client
            .search_posts(args.team_id.as_deref().unwrap_or(""), &args.query)
            .await?;

        let mut posts: Vec<&Post> = results
            .ordered()
            .into_iter()
            .filter(|p| {
                args.channel_id
                    .as_deref()
                    .map_or(true, |channel| p.channel_id == channel)
            })
            .collect();
        posts.truncate(limit);

        if posts.is_empty() {
            return Ok(format!("No posts found matching '{}'.", args.query));
        }

        let body = render_posts(ctx, &posts).await;
        Ok(format!(
            "Found {} posts matching '{}':\n{}",
            posts.len(),
            args.query,
            body
        ))
    }
}

// create_post

#[derive(Debug, Deserialize, Serialize)]
pub struct CreatePostArgs {
    pub channel_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
}

impl ToolArgs for CreatePostArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("channel_id", FieldKind::String, "ID of the channel to post in"),
        FieldSpec::required("message", FieldKind::String, "Message text (Markdown)"),
        FieldSpec::optional("root_id", FieldKind::String, "Post ID to reply to"),
        FieldSpec::optional(
            "attachments",
            FieldKind::StringArray,
            "Local file paths or URLs to upload and attach (max 10)",
        )
        .only_in(LOCAL_ONLY),
    ];
}

pub struct CreatePost;

#[async_trait]
impl Tool for CreatePost {
    type Args = CreatePostArgs;

    fn name(&self) -> &'static str {
        "create_post"
    }

    fn description(&self) -> &'static str {
        "Create a post in a channel, optionally as a reply and with file attachments."
    }

    async fn run(&self, ctx: &ToolContext, args: CreatePostArgs) -> ToolResult<String> {
        let sources = args.attachments.unwrap_or_default();
        if sources.len() > MAX_ATTACHMENTS {
            return Err(ToolError::validation(format!(
                "at most {} attachments are allowed, got {}",
                MAX_ATTACHMENTS,
                sources.len()
            )));
        }

        let mut post =
            new_post(ctx, &args.channel_id, &args.message, args.root_id.as_deref()).await?;

        let mut uploaded = Vec::new();
        for source in &sources {
            let attachment = attachments::load(ctx, source).await?;
            let info = ctx
                .client
                .upload_file(&args.channel_id, &attachment.name, attachment.data)
                .await?;
            post.file_ids.push(info.id);
            uploaded.push(info.name);
        }

        let created = ctx.client.create_post(&post).await?;
        info!(post_id = %created.id, channel_id = %created.channel_id, files = uploaded.len(), "Created post");

        let mut out = format!(
            "Created post {} in channel {}.",
            created.id, created.channel_id
        );
        if !uploaded.is_empty() {
            let _ = write!(out, " Attached: {}.", uploaded.join(", "));
        }
        Ok(out)
    }
}

// dm

#[derive(Debug, Deserialize, Serialize)]
pub struct DirectMessageArgs {
    pub username: String,
    pub message: String,
}

impl ToolArgs for DirectMessageArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("username", FieldKind::String, "Username of the recipient"),
        FieldSpec::required("message", FieldKind::String, "Message text (Markdown)"),
    ];
}

pub struct DirectMessage;

#[async_trait]
impl Tool for DirectMessage {
    type Args = DirectMessageArgs;

    fn name(&self) -> &'static str {
        "dm"
    }

    fn description(&self) -> &'static str {
        "Send a direct message to a user."
    }

    async fn run(&self, ctx: &ToolContext, args: DirectMessageArgs) -> ToolResult<String> {
        let me = ctx.client.get_me().await?;
        let other = ctx
            .client
            .get_user_by_username(args.username.trim_start_matches('@'))
            .await?;
        let channel = ctx.client.create_direct_channel(&me.id, &other.id).await?;

        let post = new_post(ctx, &channel.id, &args.message, None).await?;
        let created = ctx.client.create_post(&post).await?;
        Ok(format!(
            "Sent direct message to @{} (post {}).",
            other.username, created.id
        ))
    }
}

// group_message

#[derive(Debug, Deserialize, Serialize)]
pub struct GroupMessageArgs {
    pub usernames: Vec<String>,
    pub message: String,
}

impl ToolArgs for GroupMessageArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required(
            "usernames",
            FieldKind::StringArray,
            "Usernames of the recipients (2 to 7 people besides you)",
        ),
        FieldSpec::required("message", FieldKind::String, "Message text (Markdown)"),
    ];
}

pub struct GroupMessage;

#[async_trait]
impl Tool for GroupMessage {
    type Args = GroupMessageArgs;

    fn name(&self) -> &'static str {
        "group_message"
    }

    fn description(&self) -> &'static str {
        "Send a message to a group conversation with several users."
    }

    async fn run(&self, ctx: &ToolContext, args: GroupMessageArgs) -> ToolResult<String> {
        let mut wanted: Vec<&str> = args.usernames.iter().map(|u| u.trim_start_matches('@')).collect();
        wanted.sort_unstable();
        wanted.dedup();
        if !(2..=7).contains(&wanted.len()) {
            return Err(ToolError::validation(format!(
                "group messages need 2 to 7 other users, got {}",
                wanted.len()
            )));
        }

        let me = ctx.client.get_me().await?;
        let mut user_ids = vec![me.id.clone()];
        for username in &wanted {
            let user = ctx.client.get_user_by_username(username).await?;
            if user.id != me.id {
                user_ids.push(user.id);
            }
        }

        let channel = ctx.client.create_group_channel(&user_ids).await?;
        let post = new_post(ctx, &channel.id, &args.message, None).await?;
        let created = ctx.client.create_post(&post).await?;
        Ok(format!(
            "Sent group message to {} (post {}).",
            wanted
                .iter()
                .map(|u| format!("@{}", u))
                .collect::<Vec<_>>()
                .join(", "),
            created.id
        ))
    }
}
