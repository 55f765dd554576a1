//! The Mattermost REST collaborator.
//!
//! Tools and auth providers talk to Mattermost only through
//! [`MattermostClient`]. The workspace ships one implementation
//! ([`RestClient`](crate::RestClient)); tests use the recording double in
//! `mattermost-mcp-test-utils`.

use crate::error::ApiResult;
use crate::model::{
    Channel, ChannelMember, FileInfo, NewChannel, NewPost, NewTeam, NewUser, Post, PostList, Team,
    TeamMember, User,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Operations the tool catalog needs from a Mattermost server.
///
/// Every call runs with the credentials the client was created with.
#[async_trait]
pub trait MattermostClient: Send + Sync {
    // Users

    /// The user the credentials belong to.
    async fn get_me(&self) -> ApiResult<User>;

    async fn get_user(&self, user_id: &str) -> ApiResult<User>;

    async fn get_user_by_username(&self, username: &str) -> ApiResult<User>;

    async fn search_users(&self, term: &str, limit: u32) -> ApiResult<Vec<User>>;

    async fn create_user(&self, user: &NewUser) -> ApiResult<User>;

    /// Log in with a username and password and return a client acting as that user.
    async fn login(&self, username: &str, password: &str) -> ApiResult<Arc<dyn MattermostClient>>;

    // Posts

    async fn get_post(&self, post_id: &str) -> ApiResult<Post>;

    async fn get_post_thread(&self, post_id: &str) -> ApiResult<PostList>;

    /// Latest posts of a channel, newest first. `since` is a unix timestamp in milliseconds.
    async fn get_posts_for_channel(
        &self,
        channel_id: &str,
        per_page: u32,
        since: Option<i64>,
    ) -> ApiResult<PostList>;

    async fn search_posts(&self, team_id: &str, terms: &str) -> ApiResult<PostList>;

    async fn create_post(&self, post: &NewPost) -> ApiResult<Post>;

    async fn upload_file(
        &self,
        channel_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> ApiResult<FileInfo>;

    // Channels

    async fn get_channel(&self, channel_id: &str) -> ApiResult<Channel>;

    async fn get_channel_by_name(&self, team_id: &str, name: &str) -> ApiResult<Channel>;

    async fn get_channels_for_user(&self, user_id: &str, team_id: &str)
        -> ApiResult<Vec<Channel>>;

    async fn create_channel(&self, channel: &NewChannel) -> ApiResult<Channel>;

    async fn create_direct_channel(&self, user_a: &str, user_b: &str) -> ApiResult<Channel>;

    async fn create_group_channel(&self, user_ids: &[String]) -> ApiResult<Channel>;

    async fn get_channel_members(
        &self,
        channel_id: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResult<Vec<ChannelMember>>;

    async fn add_channel_member(&self, channel_id: &str, user_id: &str)
        -> ApiResult<ChannelMember>;

    // Teams

    async fn get_team(&self, team_id: &str) -> ApiResult<Team>;

    async fn get_team_by_name(&self, name: &str) -> ApiResult<Team>;

    async fn get_teams_for_user(&self, user_id: &str) -> ApiResult<Vec<Team>>;

    async fn get_team_members(
        &self,
        team_id: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResult<Vec<TeamMember>>;

    async fn add_team_member(&self, team_id: &str, user_id: &str) -> ApiResult<TeamMember>;

    async fn create_team(&self, team: &NewTeam) -> ApiResult<Team>;
}

/// Builds clients for a bearer token.
///
/// Injected into the auth providers so they never depend on a concrete client.
pub trait ClientFactory: Send + Sync {
    fn client_for_token(&self, token: &str) -> Arc<dyn MattermostClient>;
}
