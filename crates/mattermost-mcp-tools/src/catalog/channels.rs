//! Channel tools.

use super::page_size;
use crate::access::{FieldKind, FieldSpec, ToolArgs};
use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use async_trait::async_trait;
use mattermost_mcp_core::{Channel, ChannelType, NewChannel};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const DEFAULT_MEMBERS_PAGE: u32 = 60;
const MAX_MEMBERS_PAGE: u32 = 200;

pub(crate) fn describe_channel(channel: &Channel) -> String {
    let mut out = format!(
        "Channel: {} (~{})\nID: {}\nType: {}",
        if channel.display_name.is_empty() {
            &channel.name
        } else {
            &channel.display_name
        },
        channel.name,
        channel.id,
        channel.channel_type
    );
    if !channel.team_id.is_empty() {
        let _ = write!(out, "\nTeam ID: {}", channel.team_id);
    }
    if !channel.purpose.is_empty() {
        let _ = write!(out, "\nPurpose: {}", channel.purpose);
    }
    if !channel.header.is_empty() {
        let _ = write!(out, "\nHeader: {}", channel.header);
    }
    if channel.total_msg_count > 0 {
        let _ = write!(out, "\nMessages: {}", channel.total_msg_count);
    }
    out
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateChannelArgs {
    pub team_id: String,
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl ToolArgs for CreateChannelArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("team_id", FieldKind::String, "ID of the team"),
        FieldSpec::required(
            "name",
            FieldKind::String,
            "URL name of the channel (lowercase, no spaces)",
        ),
        FieldSpec::required("display_name", FieldKind::String, "Name shown in the UI"),
        FieldSpec::required(
            "type",
            FieldKind::Enum(&["O", "P"]),
            "O for a public channel, P for a private one",
        ),
        FieldSpec::optional("purpose", FieldKind::String, "Channel purpose"),
        FieldSpec::optional("header", FieldKind::String, "Channel header"),
    ];
}

pub struct CreateChannel;

#[async_trait]
impl Tool for CreateChannel {
    type Args = CreateChannelArgs;

    fn name(&self) -> &'static str {
        "create_channel"
    }

    fn description(&self) -> &'static str {
        "Create a public or private channel in a team."
    }

    async fn run(&self, ctx: &ToolContext, args: CreateChannelArgs) -> ToolResult<String> {
        let channel_type = match ChannelType::from_code(&args.channel_type) {
            Some(t @ (ChannelType::Open | ChannelType::Private)) => t,
            _ => {
                return Err(ToolError::validation(format!(
                    "invalid channel type '{}' (expected 'O' or 'P')",
                    args.channel_type
                )))
            }
        };

        let channel = ctx
            .client
            .create_channel(&NewChannel {
                team_id: args.team_id,
                name: args.name,
                display_name: args.display_name,
                channel_type,
                purpose: args.purpose.unwrap_or_default(),
                header: args.header.unwrap_or_default(),
            })
            .await?;

        Ok(format!(
            "Created {} channel ~{} (ID: {}).",
            channel.channel_type, channel.name, channel.id
        ))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetChannelInfoArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl ToolArgs for GetChannelInfoArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("channel_id", FieldKind::String, "ID of the channel"),
        FieldSpec::optional(
            "channel_name",
            FieldKind::String,
            "URL name of the channel; requires team_id",
        ),
        FieldSpec::optional(
            "team_id",
            FieldKind::String,
            "Team to look the channel name up in",
        ),
    ];
}

pub struct GetChannelInfo;

#[async_trait]
impl Tool for GetChannelInfo {
    type Args = GetChannelInfoArgs;

    fn name(&self) -> &'static str {
        "get_channel_info"
    }

    fn description(&self) -> &'static str {
        "Get details of a channel by ID, or by name within a team."
    }

    async fn run(&self, ctx: &ToolContext, args: GetChannelInfoArgs) -> ToolResult<String> {
        let channel = match (args.channel_id, args.channel_name, args.team_id) {
            (Some(id), _, _) => ctx.client.get_channel(&id).await?,
            (None, Some(name), Some(team_id)) => {
                ctx.client
                    .get_channel_by_name(&team_id, name.trim_start_matches('~'))
                    .await?
            }
            _ => {
                return Err(ToolError::validation(
                    "provide channel_id, or channel_name together with team_id",
                ))
            }
        };
        Ok(describe_channel(&channel))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetChannelMembersArgs {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl ToolArgs for GetChannelMembersArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("channel_id", FieldKind::String, "ID of the channel"),
        FieldSpec::optional(
            "limit",
            FieldKind::Integer,
            "Members per page (default 60, max 200)",
        ),
        FieldSpec::optional("page", FieldKind::Integer, "Zero-based page number"),
    ];
}

pub struct GetChannelMembers;

#[async_trait]
impl Tool for GetChannelMembers {
    type Args = GetChannelMembersArgs;

    fn name(&self) -> &'static str {
        "get_channel_members"
    }

    fn description(&self) -> &'static str {
        "List the members of a channel."
    }

    async fn run(&self, ctx: &ToolContext, args: GetChannelMembersArgs) -> ToolResult<String> {
        let per_page = page_size(args.limit, DEFAULT_MEMBERS_PAGE, MAX_MEMBERS_PAGE);
        let page = args.page.unwrap_or(0);

        let members = ctx
            .client
            .get_channel_members(&args.channel_id, page, per_page)
            .await?;
        if members.is_empty() {
            return Ok(format!(
                "No members found in channel {} (page {}).",
                args.channel_id, page
            ));
        }

        let ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
        let names = super::usernames(ctx.client.as_ref(), &ids).await;

        let mut out = format!(
            "{} members of channel {} (page {}):",
            members.len(),
            args.channel_id,
            page
        );
        for member in &members {
            let name = names
                .get(&member.user_id)
                .map(String::as_str)
                .unwrap_or(member.user_id.as_str());
            let _ = write!(out, "\n- @{} (ID: {})", name, member.user_id);
            if member.roles.contains("channel_admin") {
                out.push_str(" [admin]");
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AddUserToChannelArgs {
    pub user_id: String,
    pub channel_id: String,
}

impl ToolArgs for AddUserToChannelArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("user_id", FieldKind::String, "ID of the user to add"),
        FieldSpec::required("channel_id", FieldKind::String, "ID of the channel"),
    ];
}

pub struct AddUserToChannel;

#[async_trait]
impl Tool for AddUserToChannel {
    type Args = AddUserToChannelArgs;

    fn name(&self) -> &'static str {
        "add_user_to_channel"
    }

    fn description(&self) -> &'static str {
        "Add a user to a channel."
    }

    async fn run(&self, ctx: &ToolContext, args: AddUserToChannelArgs) -> ToolResult<String> {
        let member = ctx
            .client
            .add_channel_member(&args.channel_id, &args.user_id)
            .await?;
        Ok(format!(
            "Added user {} to channel {}.",
            member.user_id, member.channel_id
        ))
    }
}
