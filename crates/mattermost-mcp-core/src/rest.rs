//! Thin REST adapter over the Mattermost v4 API.
//!
//! One HTTP call per trait method, JSON in and JSON out. Error bodies of the
//! form `{"id": "...", "message": "...", "status_code": N}` are folded into
//! [`ApiError`].

use crate::client::{ClientFactory, MattermostClient};
use crate::error::{ApiError, ApiResult};
use crate::model::{
    Channel, ChannelMember, FileInfo, NewChannel, NewPost, NewTeam, NewUser, Post, PostList, Team,
    TeamMember, User,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const API_PATH: &str = "/api/v4";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    file_infos: Vec<FileInfo>,
}

/// Mattermost API client authenticated with a bearer token.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl RestClient {
    /// Create a client for `server_url` (without the `/api/v4` suffix).
    pub fn new(server_url: &str, token: impl Into<String>) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_http_client(http, server_url, token))
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_http_client(http: Client, server_url: &str, token: impl Into<String>) -> Self {
        Self {
            http,
            api_url: format!("{}{}", server_url.trim_end_matches('/'), API_PATH),
            token: token.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(method = %method, path = %path, "Mattermost API request");
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = builder.send().await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> ApiResult<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) if !body.message.is_empty() => body.message,
        Ok(body) if !body.id.is_empty() => body.id,
        _ if text.is_empty() => status.canonical_reason().unwrap_or("").to_string(),
        _ => text,
    };

    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl MattermostClient for RestClient {
    async fn get_me(&self) -> ApiResult<User> {
        self.get("/users/me").await
    }

    async fn get_user(&self, user_id: &str) -> ApiResult<User> {
        self.get(&format!("/users/{}", user_id)).await
    }

    async fn get_user_by_username(&self, username: &str) -> ApiResult<User> {
        let username = username.trim_start_matches('@');
        self.get(&format!("/users/username/{}", urlencoding::encode(username)))
            .await
    }

    async fn search_users(&self, term: &str, limit: u32) -> ApiResult<Vec<User>> {
        self.post("/users/search", &json!({ "term": term, "limit": limit }))
            .await
    }

    async fn create_user(&self, user: &NewUser) -> ApiResult<User> {
        self.post("/users", &to_json(user)?).await
    }

    async fn login(&self, username: &str, password: &str) -> ApiResult<Arc<dyn MattermostClient>> {
        let response = self
            .http
            .post(format!("{}/users/login", self.api_url))
            .json(&json!({ "login_id": username, "password": password }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let token = response
            .headers()
            .get("token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("login response carried no token".into()))?;

        Ok(Arc::new(RestClient {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            token,
        }))
    }

    async fn get_post(&self, post_id: &str) -> ApiResult<Post> {
        self.get(&format!("/posts/{}", post_id)).await
    }

    async fn get_post_thread(&self, post_id: &str) -> ApiResult<PostList> {
        self.get(&format!("/posts/{}/thread", post_id)).await
    }

    async fn get_posts_for_channel(
        &self,
        channel_id: &str,
        per_page: u32,
        since: Option<i64>,
    ) -> ApiResult<PostList> {
        let mut builder = self
            .request(Method::GET, &format!("/channels/{}/posts", channel_id))
            .query(&[("per_page", per_page.to_string())]);
        if let Some(since) = since {
            builder = builder.query(&[("since", since.to_string())]);
        }
        self.send(builder).await
    }

    async fn search_posts(&self, team_id: &str, terms: &str) -> ApiResult<PostList> {
        let path = if team_id.is_empty() {
            "/posts/search".to_string()
        } else {
            format!("/teams/{}/posts/search", team_id)
        };
        self.post(&path, &json!({ "terms": terms, "is_or_search": false }))
            .await
    }

    async fn create_post(&self, post: &NewPost) -> ApiResult<Post> {
        self.post("/posts", &to_json(post)?).await
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> ApiResult<FileInfo> {
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("channel_id", channel_id.to_string())
            .part("files", part);

        let uploaded: UploadResponse = self
            .send(self.request(Method::POST, "/files").multipart(form))
            .await?;
        uploaded
            .file_infos
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse("upload returned no file info".into()))
    }

    async fn get_channel(&self, channel_id: &str) -> ApiResult<Channel> {
        self.get(&format!("/channels/{}", channel_id)).await
    }

    async fn get_channel_by_name(&self, team_id: &str, name: &str) -> ApiResult<Channel> {
        self.get(&format!(
            "/teams/{}/channels/name/{}",
            team_id,
            urlencoding::encode(name)
        ))
        .await
    }

    async fn get_channels_for_user(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> ApiResult<Vec<Channel>> {
        self.get(&format!("/users/{}/teams/{}/channels", user_id, team_id))
            .await
    }

    async fn create_channel(&self, channel: &NewChannel) -> ApiResult<Channel> {
        self.post("/channels", &to_json(channel)?).await
    }

    async fn create_direct_channel(&self, user_a: &str, user_b: &str) -> ApiResult<Channel> {
        self.post("/channels/direct", &json!([user_a, user_b])).await
    }

    async fn create_group_channel(&self, user_ids: &[String]) -> ApiResult<Channel> {
        self.post("/channels/group", &json!(user_ids)).await
    }

    async fn get_channel_members(
        &self,
        channel_id: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResult<Vec<ChannelMember>> {
        let builder = self
            .request(Method::GET, &format!("/channels/{}/members", channel_id))
            .query(&[("page", page), ("per_page", per_page)]);
        self.send(builder).await
    }

    async fn add_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> ApiResult<ChannelMember> {
        self.post(
            &format!("/channels/{}/members", channel_id),
            &json!({ "user_id": user_id }),
        )
        .await
    }

    async fn get_team(&self, team_id: &str) -> ApiResult<Team> {
        self.get(&format!("/teams/{}", team_id)).await
    }

    async fn get_team_by_name(&self, name: &str) -> ApiResult<Team> {
        self.get(&format!("/teams/name/{}", urlencoding::encode(name)))
            .await
    }

    async fn get_teams_for_user(&self, user_id: &str) -> ApiResult<Vec<Team>> {
        self.get(&format!("/users/{}/teams", user_id)).await
    }

    async fn get_team_members(
        &self,
        team_id: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResult<Vec<TeamMember>> {
        let builder = self
            .request(Method::GET, &format!("/teams/{}/members", team_id))
            .query(&[("page", page), ("per_page", per_page)]);
        self.send(builder).await
    }

    async fn add_team_member(&self, team_id: &str, user_id: &str) -> ApiResult<TeamMember> {
        self.post(
            &format!("/teams/{}/members", team_id),
            &json!({ "team_id": team_id, "user_id": user_id }),
        )
        .await
    }

    async fn create_team(&self, team: &NewTeam) -> ApiResult<Team> {
        self.post("/teams", &to_json(team)?).await
    }
}

/// Creates [`RestClient`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct RestClientFactory {
    http: Client,
    server_url: String,
}

impl RestClientFactory {
    pub fn new(server_url: impl Into<String>) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            server_url: server_url.into(),
        })
    }
}

impl ClientFactory for RestClientFactory {
    fn client_for_token(&self, token: &str) -> Arc<dyn MattermostClient> {
        Arc::new(RestClient::with_http_client(
            self.http.clone(),
            &self.server_url,
            token,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_me_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/me"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1",
                "username": "alice"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "secret").unwrap();
        let me = client.get_me().await.unwrap();
        assert_eq!(me.username, "alice");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "id": "api.context.session_expired.app_error",
                "message": "Invalid or expired session, please login again.",
                "status_code": 401
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "expired").unwrap();
        let err = client.get_me().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("expired session"));
    }

    #[tokio::test]
    async fn test_not_found_and_other_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/posts/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/teams/t1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "t").unwrap();
        assert!(matches!(
            client.get_post("missing").await,
            Err(ApiError::NotFound(_))
        ));
        match client.get_team("t1").await {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_posts_for_channel_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/channels/c1/posts"))
            .and(query_param("per_page", "5"))
            .and(query_param("since", "1700000000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order": ["p1"],
                "posts": {"p1": {"id": "p1", "message": "hi"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "t").unwrap();
        let list = client
            .get_posts_for_channel("c1", 5, Some(1_700_000_000_000))
            .await
            .unwrap();
        assert_eq!(list.ordered()[0].message, "hi");
    }

    #[tokio::test]
    async fn test_search_posts_scoped_and_unscoped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/teams/t1/posts/search"))
            .and(body_json(json!({"terms": "deploy", "is_or_search": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v4/posts/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "t").unwrap();
        assert!(client.search_posts("t1", "deploy").await.unwrap().is_empty());
        assert!(client.search_posts("", "deploy").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_uses_returned_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/users/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Token", "session-token")
                    .set_body_json(json!({"id": "u2", "username": "bob"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/me"))
            .and(header("authorization", "Bearer session-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u2"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "admin").unwrap();
        let bob = client.login("bob", "pw").await.unwrap();
        assert_eq!(bob.get_me().await.unwrap().id, "u2");
    }

    #[tokio::test]
    async fn test_upload_file_returns_first_info() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/files"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "file_infos": [{"id": "f1", "name": "notes.txt", "size": 5}]
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "t").unwrap();
        let info = client
            .upload_file("c1", "notes.txt", b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(info.id, "f1");
    }

    #[test]
    fn test_api_url_and_debug_redacts_token() {
        let client = RestClient::new("https://mm.example.com/", "secret").unwrap();
        assert_eq!(client.api_url(), "https://mm.example.com/api/v4");
        assert!(!format!("{:?}", client).contains("secret"));
    }

    #[tokio::test]
    async fn test_factory_builds_clients_per_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/me"))
            .and(header("authorization", "Bearer a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ua"})))
            .mount(&server)
            .await;

        let factory = RestClientFactory::new(server.uri()).unwrap();
        let client = factory.client_for_token("a");
        assert_eq!(client.get_me().await.unwrap().id, "ua");
    }
}
