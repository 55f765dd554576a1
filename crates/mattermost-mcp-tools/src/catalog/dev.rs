//! Development-only tools for seeding a test server.
//!
//! Hidden from listings and refused at call time unless the server runs
//! in dev mode.

use crate::access::{FieldKind, FieldSpec, ToolArgs};
use crate::context::{ToolContext, AI_GENERATED_PROP};
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use async_trait::async_trait;
use mattermost_mcp_core::{NewPost, NewTeam, NewUser};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Deserialize, Serialize)]
pub struct CreateUserArgs {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ToolArgs for CreateUserArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("username", FieldKind::String, "Username"),
        FieldSpec::required("email", FieldKind::String, "Email address"),
        FieldSpec::required("password", FieldKind::String, "Password"),
        FieldSpec::optional("first_name", FieldKind::String, "First name"),
        FieldSpec::optional("last_name", FieldKind::String, "Last name"),
    ];
}

pub struct CreateUser;

#[async_trait]
impl Tool for CreateUser {
    type Args = CreateUserArgs;

    fn name(&self) -> &'static str {
        "create_user"
    }

    fn description(&self) -> &'static str {
        "Create a user account (development only)."
    }

    fn dev_only(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &ToolContext, args: CreateUserArgs) -> ToolResult<String> {
        let user = ctx
            .client
            .create_user(&NewUser {
                username: args.username,
                email: args.email,
                password: args.password,
                first_name: args.first_name.unwrap_or_default(),
                last_name: args.last_name.unwrap_or_default(),
            })
            .await?;
        info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(format!("Created user @{} (ID: {}).", user.username, user.id))
    }
}

#[derive(Deserialize, Serialize)]
pub struct CreatePostAsUserArgs {
    pub username: String,
    pub password: String,
    pub channel_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

impl ToolArgs for CreatePostAsUserArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("username", FieldKind::String, "User to log in as"),
        FieldSpec::required("password", FieldKind::String, "That user's password"),
        FieldSpec::required("channel_id", FieldKind::String, "ID of the channel to post in"),
        FieldSpec::required("message", FieldKind::String, "Message text (Markdown)"),
        FieldSpec::optional("root_id", FieldKind::String, "Post ID to reply to"),
    ];
}

pub struct CreatePostAsUser;

#[async_trait]
impl Tool for CreatePostAsUser {
    type Args = CreatePostAsUserArgs;

    fn name(&self) -> &'static str {
        "create_post_as_user"
    }

    fn description(&self) -> &'static str {
        "Log in as another user and post on their behalf (development only)."
    }

    fn dev_only(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &ToolContext, args: CreatePostAsUserArgs) -> ToolResult<String> {
        let as_user = ctx
            .client
            .login(&args.username, &args.password)
            .await
            .map_err(|e| {
                ToolError::execution(format!("login as '{}' failed: {}", args.username, e))
            })?;

        let mut post = NewPost::new(args.channel_id, args.message);
        if let Some(root_id) = args.root_id {
            post.root_id = root_id;
        }
        if let Some(author) = ctx.attribution_id().await? {
            post.props.insert(AI_GENERATED_PROP.to_string(), json!(author));
        }

        let created = as_user.create_post(&post).await?;
        Ok(format!(
            "Created post {} as @{} in channel {}.",
            created.id, args.username, created.channel_id
        ))
    }
}

#[derive(Deserialize, Serialize)]
pub struct CreateTeamArgs {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub team_type: String,
}

impl ToolArgs for CreateTeamArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", FieldKind::String, "URL name of the team"),
        FieldSpec::required("display_name", FieldKind::String, "Name shown in the UI"),
        FieldSpec::required(
            "type",
            FieldKind::Enum(&["O", "I"]),
            "O for an open team, I for invite only",
        ),
    ];
}

pub struct CreateTeam;

#[async_trait]
impl Tool for CreateTeam {
    type Args = CreateTeamArgs;

    fn name(&self) -> &'static str {
        "create_team"
    }

    fn description(&self) -> &'static str {
        "Create a team (development only)."
    }

    fn dev_only(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &ToolContext, args: CreateTeamArgs) -> ToolResult<String> {
        if !matches!(args.team_type.as_str(), "O" | "I") {
            return Err(ToolError::validation(format!(
                "invalid team type '{}' (expected 'O' or 'I')",
                args.team_type
            )));
        }
        let team = ctx
            .client
            .create_team(&NewTeam {
                name: args.name,
                display_name: args.display_name,
                team_type: args.team_type,
            })
            .await?;
        Ok(format!("Created team {} (ID: {}).", team.name, team.id))
    }
}
