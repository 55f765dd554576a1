//! Recording double for the Mattermost REST collaborator.

use async_trait::async_trait;
use mattermost_mcp_core::{
    ApiError, ApiResult, Channel, ChannelMember, ChannelType, ClientFactory, FileInfo,
    MattermostClient, NewChannel, NewPost, NewTeam, NewUser, Post, PostList, Team, TeamMember,
    User,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct State {
    me: Option<User>,
    users: HashMap<String, User>,
    posts: HashMap<String, Post>,
    threads: HashMap<String, PostList>,
    channel_posts: HashMap<String, PostList>,
    search_results: PostList,
    channels: HashMap<String, Channel>,
    teams: HashMap<String, Team>,
    channel_members: HashMap<String, Vec<ChannelMember>>,
    team_members: HashMap<String, Vec<TeamMember>>,
    created_posts: Vec<NewPost>,
    uploads: Vec<(String, String, usize)>,
    calls: Vec<String>,
    unauthorized: bool,
    delay: Option<Duration>,
}

/// A [`MattermostClient`] backed by in-memory data that records every call.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the code under test owns another.
#[derive(Clone, Default)]
pub struct MockMattermostClient {
    state: Arc<Mutex<State>>,
    /// Identity after `login`; shares data with the client it came from.
    acting_as: Option<User>,
}

impl MockMattermostClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user returned by `get_me`. Also registered as a regular user.
    pub fn with_me(self, user: User) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.users.insert(user.id.clone(), user.clone());
            state.me = Some(user);
        }
        self
    }

    pub fn with_user(self, user: User) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.id.clone(), user);
        self
    }

    pub fn with_post(self, post: Post) -> Self {
        self.state
            .lock()
            .unwrap()
            .posts
            .insert(post.id.clone(), post);
        self
    }

    pub fn with_thread(self, post_id: &str, thread: PostList) -> Self {
        self.state
            .lock()
            .unwrap()
            .threads
            .insert(post_id.to_string(), thread);
        self
    }

    pub fn with_channel_posts(self, channel_id: &str, posts: PostList) -> Self {
        self.state
            .lock()
            .unwrap()
            .channel_posts
            .insert(channel_id.to_string(), posts);
        self
    }

    pub fn with_search_results(self, posts: PostList) -> Self {
        self.state.lock().unwrap().search_results = posts;
        self
    }

    pub fn with_channel(self, channel: Channel) -> Self {
        self.state
            .lock()
            .unwrap()
            .channels
            .insert(channel.id.clone(), channel);
        self
    }

    pub fn with_team(self, team: Team) -> Self {
        self.state
            .lock()
            .unwrap()
            .teams
            .insert(team.id.clone(), team);
        self
    }

    pub fn with_channel_members(self, channel_id: &str, members: Vec<ChannelMember>) -> Self {
        self.state
            .lock()
            .unwrap()
            .channel_members
            .insert(channel_id.to_string(), members);
        self
    }

    pub fn with_team_members(self, team_id: &str, members: Vec<TeamMember>) -> Self {
        self.state
            .lock()
            .unwrap()
            .team_members
            .insert(team_id.to_string(), members);
        self
    }

    /// Reject every call with 401.
    pub fn unauthorized(self) -> Self {
        self.state.lock().unwrap().unauthorized = true;
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    /// Method names of every call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == method)
            .count()
    }

    pub fn created_posts(&self) -> Vec<NewPost> {
        self.state.lock().unwrap().created_posts.clone()
    }

    /// `(channel_id, file_name, size)` of every upload.
    pub fn uploads(&self) -> Vec<(String, String, usize)> {
        self.state.lock().unwrap().uploads.clone()
    }

    async fn enter(&self, method: &str) -> ApiResult<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(method.to_string());
            if state.unauthorized {
                return Err(ApiError::Unauthorized(
                    "Invalid or expired session, please login again.".to_string(),
                ));
            }
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.acting_as
            .clone()
            .or_else(|| self.with_state(|s| s.me.clone()))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

fn not_found(what: &str, id: &str) -> ApiError {
    ApiError::NotFound(format!("{} {} not found", what, id))
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[async_trait]
impl MattermostClient for MockMattermostClient {
    async fn get_me(&self) -> ApiResult<User> {
        self.enter("get_me").await?;
        self.current_user()
            .ok_or_else(|| ApiError::Unauthorized("no current user".to_string()))
    }

    async fn get_user(&self, user_id: &str) -> ApiResult<User> {
        self.enter("get_user").await?;
        self.with_state(|s| s.users.get(user_id).cloned())
            .ok_or_else(|| not_found("user", user_id))
    }

    async fn get_user_by_username(&self, username: &str) -> ApiResult<User> {
        self.enter("get_user_by_username").await?;
        let username = username.trim_start_matches('@');
        self.with_state(|s| s.users.values().find(|u| u.username == username).cloned())
            .ok_or_else(|| not_found("user", username))
    }

    async fn search_users(&self, term: &str, limit: u32) -> ApiResult<Vec<User>> {
        self.enter("search_users").await?;
        let term = term.to_lowercase();
        let mut users: Vec<User> = self.with_state(|s| {
            s.users
                .values()
                .filter(|u| {
                    u.username.to_lowercase().contains(&term)
                        || u.email.to_lowercase().contains(&term)
                        || u.display_name().to_lowercase().contains(&term)
                })
                .cloned()
                .collect()
        });
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users.truncate(limit as usize);
        Ok(users)
    }

    async fn create_user(&self, user: &NewUser) -> ApiResult<User> {
        self.enter("create_user").await?;
        let created = User {
            id: new_id(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            ..Default::default()
        };
        self.with_state(|s| s.users.insert(created.id.clone(), created.clone()));
        Ok(created)
    }

    async fn login(&self, username: &str, _password: &str) -> ApiResult<Arc<dyn MattermostClient>> {
        self.enter("login").await?;
        let user = self
            .with_state(|s| s.users.values().find(|u| u.username == username).cloned())
            .ok_or_else(|| ApiError::Unauthorized("invalid login".to_string()))?;

        Ok(Arc::new(MockMattermostClient {
            state: self.state.clone(),
            acting_as: Some(user),
        }))
    }

    async fn get_post(&self, post_id: &str) -> ApiResult<Post> {
        self.enter("get_post").await?;
        self.with_state(|s| s.posts.get(post_id).cloned())
            .ok_or_else(|| not_found("post", post_id))
    }

    async fn get_post_thread(&self, post_id: &str) -> ApiResult<PostList> {
        self.enter("get_post_thread").await?;
        self.with_state(|s| s.threads.get(post_id).cloned())
            .ok_or_else(|| not_found("thread", post_id))
    }

    async fn get_posts_for_channel(
        &self,
        channel_id: &str,
        per_page: u32,
        since: Option<i64>,
    ) -> ApiResult<PostList> {
        self.enter("get_posts_for_channel").await?;
        let mut list = self
            .with_state(|s| s.channel_posts.get(channel_id).cloned())
            .unwrap_or_default();
        if let Some(since) = since {
            let posts = &list.posts;
            list.order
                .retain(|id| posts.get(id).map(|p| p.create_at >= since).unwrap_or(false));
        }
        list.order.truncate(per_page as usize);
        Ok(list)
    }

    async fn search_posts(&self, _team_id: &str, _terms: &str) -> ApiResult<PostList> {
        self.enter("search_posts").await?;
        Ok(self.with_state(|s| s.search_results.clone()))
    }

    async fn create_post(&self, post: &NewPost) -> ApiResult<Post> {
        self.enter("create_post").await?;
        let created = Post {
            id: new_id(),
            channel_id: post.channel_id.clone(),
            root_id: post.root_id.clone(),
            message: post.message.clone(),
            user_id: self.current_user().map(|u| u.id).unwrap_or_default(),
            props: post.props.clone(),
            file_ids: post.file_ids.clone(),
            ..Default::default()
        };
        self.with_state(|s| {
            s.created_posts.push(post.clone());
            s.posts.insert(created.id.clone(), created.clone())
        });
        Ok(created)
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> ApiResult<FileInfo> {
        self.enter("upload_file").await?;
        self.with_state(|s| {
            s.uploads
                .push((channel_id.to_string(), file_name.to_string(), data.len()))
        });
        Ok(FileInfo {
            id: new_id(),
            name: file_name.to_string(),
            size: data.len() as i64,
            ..Default::default()
        })
    }

    async fn get_channel(&self, channel_id: &str) -> ApiResult<Channel> {
        self.enter("get_channel").await?;
        self.with_state(|s| s.channels.get(channel_id).cloned())
            .ok_or_else(|| not_found("channel", channel_id))
    }

    async fn get_channel_by_name(&self, team_id: &str, name: &str) -> ApiResult<Channel> {
        self.enter("get_channel_by_name").await?;
        self.with_state(|s| {
            s.channels
                .values()
                .find(|c| c.team_id == team_id && c.name == name)
                .cloned()
        })
        .ok_or_else(|| not_found("channel", name))
    }

    async fn get_channels_for_user(
        &self,
        _user_id: &str,
        team_id: &str,
    ) -> ApiResult<Vec<Channel>> {
        self.enter("get_channels_for_user").await?;
        let mut channels: Vec<Channel> = self.with_state(|s| {
            s.channels
                .values()
                .filter(|c| c.team_id == team_id)
                .cloned()
                .collect()
        });
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(channels)
    }

    async fn create_channel(&self, channel: &NewChannel) -> ApiResult<Channel> {
        self.enter("create_channel").await?;
        let created = Channel {
            id: new_id(),
            team_id: channel.team_id.clone(),
            channel_type: channel.channel_type,
            name: channel.name.clone(),
            display_name: channel.display_name.clone(),
            purpose: channel.purpose.clone(),
            header: channel.header.clone(),
            ..Default::default()
        };
        self.with_state(|s| s.channels.insert(created.id.clone(), created.clone()));
        Ok(created)
    }

    async fn create_direct_channel(&self, user_a: &str, user_b: &str) -> ApiResult<Channel> {
        self.enter("create_direct_channel").await?;
        Ok(Channel {
            id: format!("dm-{}-{}", user_a, user_b),
            channel_type: ChannelType::Direct,
            name: format!("{}__{}", user_a, user_b),
            ..Default::default()
        })
    }

    async fn create_group_channel(&self, user_ids: &[String]) -> ApiResult<Channel> {
        self.enter("create_group_channel").await?;
        Ok(Channel {
            id: format!("gm-{}", user_ids.join("-")),
            channel_type: ChannelType::Group,
            ..Default::default()
        })
    }

    async fn get_channel_members(
        &self,
        channel_id: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResult<Vec<ChannelMember>> {
        self.enter("get_channel_members").await?;
        let members = self
            .with_state(|s| s.channel_members.get(channel_id).cloned())
            .unwrap_or_default();
        Ok(members
            .into_iter()
            .skip((page * per_page) as usize)
            .take(per_page as usize)
            .collect())
    }

    async fn add_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> ApiResult<ChannelMember> {
        self.enter("add_channel_member").await?;
        let member = ChannelMember {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            roles: "channel_user".to_string(),
            ..Default::default()
        };
        self.with_state(|s| {
            s.channel_members
                .entry(channel_id.to_string())
                .or_default()
                .push(member.clone())
        });
        Ok(member)
    }

    async fn get_team(&self, team_id: &str) -> ApiResult<Team> {
        self.enter("get_team").await?;
        self.with_state(|s| s.teams.get(team_id).cloned())
            .ok_or_else(|| not_found("team", team_id))
    }

    async fn get_team_by_name(&self, name: &str) -> ApiResult<Team> {
        self.enter("get_team_by_name").await?;
        self.with_state(|s| s.teams.values().find(|t| t.name == name).cloned())
            .ok_or_else(|| not_found("team", name))
    }

    async fn get_teams_for_user(&self, _user_id: &str) -> ApiResult<Vec<Team>> {
        self.enter("get_teams_for_user").await?;
        let mut teams: Vec<Team> = self.with_state(|s| s.teams.values().cloned().collect());
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn get_team_members(
        &self,
        team_id: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResult<Vec<TeamMember>> {
        self.enter("get_team_members").await?;
        let members = self
            .with_state(|s| s.team_members.get(team_id).cloned())
            .unwrap_or_default();
        Ok(members
            .into_iter()
            .skip((page * per_page) as usize)
            .take(per_page as usize)
            .collect())
    }

    async fn add_team_member(&self, team_id: &str, user_id: &str) -> ApiResult<TeamMember> {
        self.enter("add_team_member").await?;
        let member = TeamMember {
            team_id: team_id.to_string(),
            user_id: user_id.to_string(),
            roles: "team_user".to_string(),
        };
        self.with_state(|s| {
            s.team_members
                .entry(team_id.to_string())
                .or_default()
                .push(member.clone())
        });
        Ok(member)
    }

    async fn create_team(&self, team: &NewTeam) -> ApiResult<Team> {
        self.enter("create_team").await?;
        let created = Team {
            id: new_id(),
            name: team.name.clone(),
            display_name: team.display_name.clone(),
            team_type: team.team_type.clone(),
            ..Default::default()
        };
        self.with_state(|s| s.teams.insert(created.id.clone(), created.clone()));
        Ok(created)
    }
}

/// A [`ClientFactory`] that maps tokens to pre-built mock clients.
///
/// Unknown tokens get a client that answers every call with 401.
#[derive(Clone, Default)]
pub struct MockClientFactory {
    clients: Arc<Mutex<HashMap<String, MockMattermostClient>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(self, token: &str, client: MockMattermostClient) -> Self {
        self.clients
            .lock()
            .unwrap()
            .insert(token.to_string(), client);
        self
    }

    /// Tokens clients were requested for, in order.
    pub fn requested_tokens(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl ClientFactory for MockClientFactory {
    fn client_for_token(&self, token: &str) -> Arc<dyn MattermostClient> {
        self.requested.lock().unwrap().push(token.to_string());
        let client = self
            .clients
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_else(|| MockMattermostClient::new().unauthorized());
        Arc::new(client)
    }
}
