//! MCP over HTTP.
//!
//! # Endpoints
//!
//! - `POST /mcp` - streamable HTTP: one JSON-RPC message per request
//! - `GET /sse` + `POST /message?sessionId=<id>` - legacy SSE pair
//! - `GET /.well-known/oauth-protected-resource[/mcp]` - RFC 9728 metadata
//! - `GET /health`
//!
//! Every MCP route requires `Authorization: Bearer <token>`. The server is
//! stateless per request: each call builds a session from the presented
//! token and the shared [`ToolServer`].

use crate::config::{HttpServerConfig, MCP_PATH, PROTECTED_RESOURCE_PATH};
use crate::error::{ServerError, ServerResult};
use crate::metadata::{bearer_challenge, ProtectedResourceMetadata};
use crate::security::{cors, security_headers, validate_origin, OriginAllowList};
use crate::session::{McpSession, ToolServer};
use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Extension, Router,
};
use futures::stream::Stream;
use mattermost_mcp_auth::AuthContext;
use mattermost_mcp_core::AccessMode;
use mattermost_mcp_protocol::{error_codes, JsonRpcRequest, JsonRpcResponse};
use serde::Deserialize;
use serde_json::json;
use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// An open legacy SSE stream and the bearer token that opened it.
struct SseStream {
    sender: mpsc::UnboundedSender<JsonRpcResponse>,
    owner: String,
}

type StreamMap = Arc<Mutex<HashMap<String, SseStream>>>;

/// Removes a stream from the map when its response body is dropped.
struct StreamGuard {
    streams: StreamMap,
    session_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let removed = self
            .streams
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.session_id);
        if removed.is_some() {
            info!(session_id = %self.session_id, "SSE stream closed");
        }
    }
}

/// Shared state of the HTTP transport.
#[derive(Clone)]
pub struct HttpState {
    server: Arc<ToolServer>,
    config: Arc<HttpServerConfig>,
    /// Open legacy SSE streams by session id.
    streams: StreamMap,
}

impl HttpState {
    pub fn new(server: Arc<ToolServer>, config: HttpServerConfig) -> Self {
        Self {
            server,
            config: Arc::new(config),
            streams: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn session(&self, auth: AuthContext) -> McpSession {
        McpSession::new(self.server.clone(), auth, AccessMode::Remote)
    }

    /// Register a stream. Dropping the returned guard unregisters it.
    fn open_stream(
        &self,
        session_id: String,
        owner: String,
        sender: mpsc::UnboundedSender<JsonRpcResponse>,
    ) -> StreamGuard {
        self.lock_streams()
            .insert(session_id.clone(), SseStream { sender, owner });
        info!(session_id = %session_id, "SSE stream opened");
        StreamGuard {
            streams: self.streams.clone(),
            session_id,
        }
    }

    /// Number of open legacy SSE streams.
    pub fn open_streams(&self) -> usize {
        self.lock_streams().len()
    }

    fn lock_streams(&self) -> MutexGuard<'_, HashMap<String, SseStream>> {
        self.streams.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// The token a stream is bound to.
fn bearer_token(auth: &AuthContext) -> Option<&str> {
    match auth {
        AuthContext::Bearer(token) => Some(token),
        _ => None,
    }
}

fn unauthorized(config: &HttpServerConfig, error: Option<&str>, message: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": message})),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&bearer_challenge(config, error)) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

/// Extract and validate the bearer token, then hand it to the handler.
async fn require_bearer(State(state): State<HttpState>, mut request: Request, next: Next) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(auth) = header_value.and_then(AuthContext::from_authorization_header) else {
        debug!(path = %request.uri().path(), "Missing bearer token");
        return unauthorized(&state.config, None, "authentication required");
    };

    if let Err(e) = state.server.provider().validate_auth(&auth).await {
        warn!(error = %e, "Rejected bearer token");
        return unauthorized(&state.config, Some("invalid_token"), &e.to_string());
    }

    request.extensions_mut().insert(auth);
    next.run(request).await
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    accept.contains("text/event-stream") && !accept.contains("application/json")
}

async fn mcp_post(
    State(state): State<HttpState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                )),
            )
                .into_response()
        }
    };

    let Some(response) = state.session(auth).handle(request).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    if wants_event_stream(&headers) {
        let data = match serde_json::to_string(&response) {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "Failed to encode response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        let stream = futures::stream::once(async move {
            Ok::<_, Infallible>(Event::default().event("message").data(data))
        });
        return Sse::new(stream).into_response();
    }

    Json(response).into_response()
}

async fn mcp_get() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({"error": "use POST for MCP requests"})),
    )
        .into_response()
}

/// Open a legacy SSE stream. The first event names the message endpoint.
///
/// The stream is bound to the opener's bearer token and unregistered when
/// the client goes away.
async fn sse_connect(
    State(state): State<HttpState>,
    Extension(auth): Extension<AuthContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
    let owner = bearer_token(&auth).unwrap_or_default().to_string();
    let guard = state.open_stream(session_id.clone(), owner, tx);

    let message_url = format!("/message?sessionId={}", session_id);
    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(message_url));

        while let Some(response) = rx.recv().await {
            match serde_json::to_string(&response) {
                Ok(data) => yield Ok(Event::default().event("message").data(data)),
                Err(e) => error!(error = %e, "Failed to encode response"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE).text("ping"))
}

#[derive(Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn sse_message(
    State(state): State<HttpState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<MessageQuery>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let stream = state
        .lock_streams()
        .get(&query.session_id)
        .map(|s| (s.sender.clone(), s.owner.clone()));
    let Some((tx, owner)) = stream else {
        warn!(session_id = %query.session_id, "Message for unknown SSE session");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "session not found"})),
        )
            .into_response();
    };

    if bearer_token(&auth) != Some(owner.as_str()) {
        warn!(session_id = %query.session_id, "Message from a caller that did not open the stream");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "session belongs to another caller"})),
        )
            .into_response();
    }

    if let Some(response) = state.session(auth).handle(request).await {
        if tx.send(response).is_err() {
            state.lock_streams().remove(&query.session_id);
            return (StatusCode::GONE, Json(json!({"error": "stream closed"}))).into_response();
        }
    }
    (StatusCode::ACCEPTED, Json(json!({"status": "ok"}))).into_response()
}

async fn protected_resource_metadata(State(state): State<HttpState>) -> Response {
    match ProtectedResourceMetadata::for_config(&state.config) {
        Some(metadata) => (
            [
                (header::CACHE_CONTROL, "public, max-age=3600"),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            Json(metadata),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no external site URL configured"})),
        )
            .into_response(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// The HTTP transport server.
pub struct HttpServer {
    state: HttpState,
}

impl HttpServer {
    pub fn new(server: Arc<ToolServer>, config: HttpServerConfig) -> Self {
        Self {
            state: HttpState::new(server, config),
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Listen until Ctrl-C.
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.state.config.listen_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(
            addr = %addr,
            resource = %self.state.config.resource_url(),
            "Serving MCP over HTTP"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Method;
    use mattermost_mcp_auth::OAuthAuthProvider;
    use mattermost_mcp_test_utils::{fixtures, MockClientFactory, MockMattermostClient};
    use mattermost_mcp_tools::ToolRegistry;
    use tower::ServiceExt;

    fn router(site_url: Option<&str>) -> (Router, MockMattermostClient) {
        let (state, mock) = http_state(site_url);
        (create_router(state), mock)
    }

    fn http_state(site_url: Option<&str>) -> (HttpState, MockMattermostClient) {
        let mock = MockMattermostClient::new().with_team(fixtures::team("t1", "eng"));
        let factory = Arc::new(MockClientFactory::new().with_client("good", mock.clone()));
        let server = ToolServer::new(
            ToolRegistry::with_catalog(false),
            Arc::new(OAuthAuthProvider::new(factory)),
        );
        let config = HttpServerConfig {
            mattermost_url: "https://chat.example.com".to_string(),
            site_url: site_url.map(str::to_string),
            ..Default::default()
        };
        (HttpState::new(Arc::new(server), config), mock)
    }

    fn rpc(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header(header::AUTHORIZATION, "Bearer good")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json, text/event-stream")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_gets_challenge() {
        let (app, _) = router(Some("https://mcp.example.com"));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/mcp")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert!(challenge.contains(
            "resource_metadata=\"https://mcp.example.com/.well-known/oauth-protected-resource\""
        ));
    }

    #[tokio::test]
    async fn test_tool_call_with_bearer() {
        let (app, mock) = router(None);
        let response = app
            .oneshot(rpc(json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": {"name": "get_team_info", "arguments": {"team_id": "t1"}}
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
        let body = body_json(response).await;
        assert_eq!(body["id"], 7);
        assert_eq!(body["result"]["isError"], false);
        assert_eq!(mock.call_count("get_team"), 1);
    }

    #[tokio::test]
    async fn test_remote_caller_cannot_send_attachments() {
        let (app, mock) = router(None);
        let response = app
            .oneshot(rpc(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {
                    "name": "create_post",
                    "arguments": {"channel_id": "c1", "message": "x", "attachments": ["/etc/passwd"]}
                }
            })))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["result"]["isError"], true);
        assert_eq!(
            body["result"]["content"][0]["text"],
            "field 'attachments' is not available in remote access mode"
        );
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_notification_is_accepted() {
        let (app, _) = router(None);
        let response = app
            .oneshot(rpc(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_event_stream_only_client_gets_sse() {
        let (app, _) = router(None);
        let mut request = rpc(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        request
            .headers_mut()
            .insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("event: message"));
        assert!(text.contains("\"id\":1"));
    }

    #[tokio::test]
    async fn test_get_mcp_is_405() {
        let (app, _) = router(None);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/mcp")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_origin_checks() {
        let (app, _) = router(None);

        let mut evil = rpc(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        evil.headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://evil.example.com"));
        let response = app.clone().oneshot(evil).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let mut good = rpc(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        good.headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://chat.example.com:443"));
        let response = app.clone().oneshot(good).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://chat.example.com:443"
        );

        let no_origin = rpc(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        let response = app.oneshot(no_origin).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_preflight() {
        let (app, _) = router(None);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/mcp")
                    .header(header::ORIGIN, "http://localhost:8080")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .contains("Authorization"));
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn test_metadata_endpoints() {
        let (app, _) = router(None);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(PROTECTED_RESOURCE_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let (app, _) = router(Some("https://mcp.example.com"));
        for path in [
            PROTECTED_RESOURCE_PATH.to_string(),
            format!("{}{}", PROTECTED_RESOURCE_PATH, MCP_PATH),
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CACHE_CONTROL],
                "public, max-age=3600"
            );
            assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            let body = body_json(response).await;
            assert_eq!(body["resource"], "https://mcp.example.com/mcp");
            assert_eq!(body["authorization_servers"][0], "https://chat.example.com");
        }
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let (app, _) = router(None);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_message_for_unknown_session() {
        let (app, _) = router(None);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/message?sessionId=missing")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn open_sse(token: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri("/sse")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn message(url: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
            ))
            .unwrap()
    }

    /// Read SSE events until the `endpoint` event and return its URL.
    async fn endpoint_url(response: Response) -> (String, axum::body::BodyDataStream) {
        use futures::StreamExt;

        let mut body = response.into_body().into_data_stream();
        let mut text = String::new();
        while let Some(chunk) = body.next().await {
            text.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if let Some(url) = text
                .lines()
                .find_map(|l| l.strip_prefix("data:").map(str::trim))
                .filter(|u| u.starts_with("/message"))
            {
                return (url.to_string(), body);
            }
        }
        panic!("stream ended before the endpoint event: {text}");
    }

    #[tokio::test]
    async fn test_dropped_sse_streams_are_unregistered() {
        let (state, _) = http_state(None);
        let app = create_router(state.clone());

        for _ in 0..3 {
            let response = app.clone().oneshot(open_sse("good")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(state.open_streams(), 1);
            drop(response);
        }
        assert_eq!(state.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_sse_session_is_bound_to_its_opener() {
        let (state, _) = http_state(None);
        let app = create_router(state.clone());

        let response = app.clone().oneshot(open_sse("good")).await.unwrap();
        let (url, _body) = endpoint_url(response).await;

        let response = app.clone().oneshot(message(&url, "someone-else")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.clone().oneshot(message(&url, "good")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(state.open_streams(), 1);
    }
}
