//! Team tools.

use super::{page_size, usernames};
use crate::access::{FieldKind, FieldSpec, ToolArgs};
use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use async_trait::async_trait;
use mattermost_mcp_core::Team;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const DEFAULT_MEMBERS_PAGE: u32 = 60;
const MAX_MEMBERS_PAGE: u32 = 200;

fn team_kind(team_type: &str) -> &'static str {
    match team_type {
        "I" => "invite only",
        _ => "open",
    }
}

pub(crate) fn describe_team(team: &Team) -> String {
    let mut out = format!(
        "Team: {} ({})\nID: {}\nType: {}",
        team.display_name,
        team.name,
        team.id,
        team_kind(&team.team_type)
    );
    if !team.description.is_empty() {
        let _ = write!(out, "\nDescription: {}", team.description);
    }
    out
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetTeamInfoArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
}

impl ToolArgs for GetTeamInfoArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("team_id", FieldKind::String, "ID of the team"),
        FieldSpec::optional("team_name", FieldKind::String, "URL name of the team"),
    ];
}

pub struct GetTeamInfo;

#[async_trait]
impl Tool for GetTeamInfo {
    type Args = GetTeamInfoArgs;

    fn name(&self) -> &'static str {
        "get_team_info"
    }

    fn description(&self) -> &'static str {
        "Get details of a team by ID or name."
    }

    async fn run(&self, ctx: &ToolContext, args: GetTeamInfoArgs) -> ToolResult<String> {
        let team = match (args.team_id, args.team_name) {
            (Some(id), _) => ctx.client.get_team(&id).await?,
            (None, Some(name)) => ctx.client.get_team_by_name(&name).await?,
            (None, None) => return Err(ToolError::validation("provide team_id or team_name")),
        };
        Ok(describe_team(&team))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetTeamMembersArgs {
    pub team_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl ToolArgs for GetTeamMembersArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("team_id", FieldKind::String, "ID of the team"),
        FieldSpec::optional(
            "limit",
            FieldKind::Integer,
            "Members per page (default 60, max 200)",
        ),
        FieldSpec::optional("page", FieldKind::Integer, "Zero-based page number"),
    ];
}

pub struct GetTeamMembers;

#[async_trait]
impl Tool for GetTeamMembers {
    type Args = GetTeamMembersArgs;

    fn name(&self) -> &'static str {
        "get_team_members"
    }

    fn description(&self) -> &'static str {
        "List the members of a team."
    }

    async fn run(&self, ctx: &ToolContext, args: GetTeamMembersArgs) -> ToolResult<String> {
        let per_page = page_size(args.limit, DEFAULT_MEMBERS_PAGE, MAX_MEMBERS_PAGE);
        let page = args.page.unwrap_or(0);

        let members = ctx
            .client
            .get_team_members(&args.team_id, page, per_page)
            .await?;
        if members.is_empty() {
            return Ok(format!(
                "No members found in team {} (page {}).",
                args.team_id, page
            ));
        }

        let ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
        let names = usernames(ctx.client.as_ref(), &ids).await;
        let mut out = format!(
            "{} members of team {} (page {}):",
            members.len(),
            args.team_id,
            page
        );
        for member in &members {
            let name = names
                .get(&member.user_id)
                .map(String::as_str)
                .unwrap_or(member.user_id.as_str());
            let _ = write!(out, "\n- @{} (ID: {})", name, member.user_id);
            if member.roles.contains("team_admin") {
                out.push_str(" [admin]");
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AddUserToTeamArgs {
    pub user_id: String,
    pub team_id: String,
}

impl ToolArgs for AddUserToTeamArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("user_id", FieldKind::String, "ID of the user to add"),
        FieldSpec::required("team_id", FieldKind::String, "ID of the team"),
    ];
}

pub struct AddUserToTeam;

#[async_trait]
impl Tool for AddUserToTeam {
    type Args = AddUserToTeamArgs;

    fn name(&self) -> &'static str {
        "add_user_to_team"
    }

    fn description(&self) -> &'static str {
        "Add a user to a team."
    }

    async fn run(&self, ctx: &ToolContext, args: AddUserToTeamArgs) -> ToolResult<String> {
        let member = ctx
            .client
            .add_team_member(&args.team_id, &args.user_id)
            .await?;
        Ok(format!(
            "Added user {} to team {}.",
            member.user_id, member.team_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;
    use mattermost_mcp_core::{AccessMode, TeamMember};
    use mattermost_mcp_test_utils::{fixtures, MockMattermostClient};
    use serde_json::json;
    use std::sync::Arc;

    async fn call(client: &MockMattermostClient, tool: &str, args: serde_json::Value) -> (bool, String) {
        let ctx = ToolContext::new(Arc::new(client.clone()), AccessMode::Local, reqwest::Client::new());
        let result = ToolRegistry::with_catalog(false)
            .execute(tool, Some(args), &ctx)
            .await;
        (result.is_error, result.text_content())
    }

    #[tokio::test]
    async fn test_team_info() {
        let client = MockMattermostClient::new().with_team(fixtures::team("t1", "eng"));

        let (_, by_id) = call(&client, "get_team_info", json!({"team_id": "t1"})).await;
        let (_, by_name) = call(&client, "get_team_info", json!({"team_name": "eng"})).await;
        assert_eq!(by_id, by_name);
        assert!(by_id.contains("Type: open"));

        let (is_error, _) = call(&client, "get_team_info", json!({})).await;
        assert!(is_error);

        let (is_error, text) = call(&client, "get_team_info", json!({"team_id": "nope"})).await;
        assert!(is_error);
        assert!(text.contains("not found"));
    }

    #[tokio::test]
    async fn test_team_members_and_add() {
        let client = MockMattermostClient::new()
            .with_user(fixtures::user("u1", "alice"))
            .with_team_members(
                "t1",
                vec![TeamMember {
                    team_id: "t1".to_string(),
                    user_id: "u1".to_string(),
                    roles: "team_user team_admin".to_string(),
                }],
            );

        let (is_error, text) = call(
            &client,
            "add_user_to_team",
            json!({"user_id": "u2", "team_id": "t1"}),
        )
        .await;
        assert!(!is_error);
        assert_eq!(text, "Added user u2 to team t1.");

        let (_, text) = call(&client, "get_team_members", json!({"team_id": "t1"})).await;
        assert!(text.starts_with("2 members of team t1"));
        assert!(text.contains("@alice (ID: u1) [admin]"));
    }
}
