//! In-process transport for hosts that embed the server.
//!
//! Each [`InMemoryServer::connect`] verifies the caller's identity, then
//! spawns one session task wired to the returned [`InMemoryTransport`] by a
//! pair of capacity-1 channels. A panic in the task is caught and logged;
//! the host only sees the transport close.

use crate::error::ServerResult;
use crate::session::{McpSession, ToolServer};
use async_trait::async_trait;
use futures::FutureExt;
use mattermost_mcp_auth::{AuthContext, AuthError, TokenResolver, UserIdentityProvider};
use mattermost_mcp_core::AccessMode;
use mattermost_mcp_protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpError, McpResult, Transport,
};
use mattermost_mcp_tools::ToolRegistry;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// An MCP server reachable only from inside the host process.
pub struct InMemoryServer<P> {
    server: Arc<ToolServer>,
    identity: Arc<P>,
    resolver: Arc<dyn TokenResolver>,
}

impl<P: UserIdentityProvider + 'static> InMemoryServer<P> {
    pub fn new(registry: ToolRegistry, provider: Arc<P>, resolver: Arc<dyn TokenResolver>) -> Self {
        Self {
            server: Arc::new(ToolServer::new(registry, provider.clone())),
            identity: provider,
            resolver,
        }
    }

    /// Share an already configured [`ToolServer`]. Its provider should be
    /// `provider`, or sessions will authenticate differently from `connect`.
    pub fn with_server(server: Arc<ToolServer>, provider: Arc<P>, resolver: Arc<dyn TokenResolver>) -> Self {
        Self {
            server,
            identity: provider,
            resolver,
        }
    }

    pub fn server(&self) -> &Arc<ToolServer> {
        &self.server
    }

    /// Open a session for `user_id` authenticated by the host session.
    ///
    /// Refused when the session resolves to a different user.
    pub async fn connect(&self, user_id: &str, session_id: &str) -> ServerResult<InMemoryTransport> {
        if session_id.is_empty() {
            return Err(AuthError::MissingCredentials("session id is empty".to_string()).into());
        }

        let auth = AuthContext::session(session_id, self.resolver.clone());
        let user = self.identity.authenticated_user(&auth).await?;
        if user.id != user_id {
            return Err(AuthError::IdentityMismatch {
                expected: user_id.to_string(),
                actual: user.id,
            }
            .into());
        }

        let (request_tx, request_rx) = mpsc::channel(1);
        let (response_tx, response_rx) = mpsc::channel(1);
        let session = McpSession::new(self.server.clone(), auth, AccessMode::Remote);
        spawn_session(session, session_id.to_string(), request_rx, response_tx);

        info!(user_id = %user_id, session_id = %session_id, "Embedded session connected");
        Ok(InMemoryTransport {
            session_id: session_id.to_string(),
            requests: std::sync::Mutex::new(Some(request_tx)),
            responses: Mutex::new(response_rx),
        })
    }
}

fn spawn_session(
    session: McpSession,
    session_id: String,
    mut requests: mpsc::Receiver<JsonRpcRequest>,
    responses: mpsc::Sender<JsonRpcResponse>,
) {
    let serve = async move {
        while let Some(request) = requests.recv().await {
            if let Some(response) = session.handle(request).await {
                if responses.send(response).await.is_err() {
                    break;
                }
            }
        }
    };

    tokio::spawn(async move {
        match AssertUnwindSafe(serve).catch_unwind().await {
            Ok(()) => debug!(session_id = %session_id, "Embedded session ended"),
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                error!(session_id = %session_id, panic = %detail, "Embedded session panicked");
            }
        }
    });
}

/// Client end of an embedded session.
pub struct InMemoryTransport {
    session_id: String,
    requests: std::sync::Mutex<Option<mpsc::Sender<JsonRpcRequest>>>,
    /// Held across send and receive so responses pair with their requests.
    responses: Mutex<mpsc::Receiver<JsonRpcResponse>>,
}

impl InMemoryTransport {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn sender(&self) -> McpResult<mpsc::Sender<JsonRpcRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(McpError::ConnectionClosed)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn request(&self, request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let mut responses = self.responses.lock().await;
        let id = request.id.clone();
        self.sender()?
            .send(request)
            .await
            .map_err(|_| McpError::ConnectionClosed)?;

        // A caller that gave up on an earlier request leaves its response
        // queued ahead of ours.
        loop {
            let response = responses.recv().await.ok_or(McpError::ConnectionClosed)?;
            if response.id.is_none() || response.id == id {
                return Ok(response);
            }
            debug!(
                session_id = %self.session_id,
                stale = ?response.id,
                expected = ?id,
                "Discarding response to an abandoned request"
            );
        }
    }

    async fn notify(&self, notification: JsonRpcNotification) -> McpResult<()> {
        self.sender()?
            .send(notification.into())
            .await
            .map_err(|_| McpError::ConnectionClosed)
    }

    async fn close(&self) -> McpResult<()> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        debug!(session_id = %self.session_id, "Embedded transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use mattermost_mcp_auth::{AuthResult, SessionAuthProvider};
    use mattermost_mcp_protocol::{ListToolsResult, ToolCallResult};
    use mattermost_mcp_test_utils::{fixtures, MockClientFactory, MockMattermostClient};
    use mattermost_mcp_tools::{FieldSpec, Tool, ToolArgs, ToolContext, ToolResult};
    use serde::Deserialize;
    use serde_json::json;

    struct FixedResolver;

    #[async_trait]
    impl TokenResolver for FixedResolver {
        async fn resolve_token(&self, session_id: &str) -> AuthResult<String> {
            Ok(format!("tok-{}", session_id))
        }
    }

    #[derive(Deserialize)]
    struct NoArgs {}

    impl ToolArgs for NoArgs {
        const FIELDS: &'static [FieldSpec] = &[];
    }

    struct Explode;

    #[async_trait]
    impl Tool for Explode {
        type Args = NoArgs;

        fn name(&self) -> &'static str {
            "explode"
        }

        fn description(&self) -> &'static str {
            "Always panics"
        }

        async fn run(&self, _ctx: &ToolContext, _args: NoArgs) -> ToolResult<String> {
            panic!("boom")
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        type Args = NoArgs;

        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn description(&self) -> &'static str {
            "Answers after 100ms"
        }

        async fn run(&self, _ctx: &ToolContext, _args: NoArgs) -> ToolResult<String> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok("slept".to_string())
        }
    }

    fn embedded(registry: ToolRegistry) -> (InMemoryServer<SessionAuthProvider>, MockMattermostClient) {
        let mock = MockMattermostClient::new()
            .with_me(fixtures::user("u1", "alice"))
            .with_team(fixtures::team("t1", "eng"));
        let factory = MockClientFactory::new().with_client("tok-s1", mock.clone());
        let provider = Arc::new(SessionAuthProvider::new(Arc::new(factory)));
        (
            InMemoryServer::new(registry, provider, Arc::new(FixedResolver)),
            mock,
        )
    }

    #[tokio::test]
    async fn test_identity_mismatch_is_refused() {
        let (server, _) = embedded(ToolRegistry::with_catalog(false));
        let err = server.connect("u2", "s1").await.err().unwrap();
        assert!(matches!(
            err,
            ServerError::Auth(AuthError::IdentityMismatch { .. })
        ));
        assert!(err.to_string().starts_with("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_session_is_refused() {
        let (server, mock) = embedded(ToolRegistry::with_catalog(false));
        let err = server.connect("u1", "").await.err().unwrap();
        assert!(matches!(
            err,
            ServerError::Auth(AuthError::MissingCredentials(_))
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_schema_and_tool_call() {
        let (server, mock) = embedded(ToolRegistry::with_catalog(false));
        let transport = server.connect("u1", "s1").await.unwrap();
        assert_eq!(transport.session_id(), "s1");
        assert!(transport.is_connected());

        let response = transport
            .request(JsonRpcRequest::new(1u64, "tools/list", None))
            .await
            .unwrap();
        let listed: ListToolsResult = serde_json::from_value(response.result.unwrap()).unwrap();
        let create_post = listed.tools.iter().find(|t| t.name == "create_post").unwrap();
        assert!(create_post.input_schema.as_ref().unwrap()["properties"]
            .get("attachments")
            .is_none());

        transport
            .notify(JsonRpcNotification::new("notifications/initialized", None))
            .await
            .unwrap();

        let response = transport
            .request(JsonRpcRequest::new(
                2u64,
                "tools/call",
                Some(json!({"name": "get_team_info", "arguments": {"team_id": "t1"}})),
            ))
            .await
            .unwrap();
        let result: ToolCallResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert!(!result.is_error);
        assert!(result.text_content().contains("eng"));
        assert_eq!(mock.call_count("get_team"), 1);

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        let err = transport
            .request(JsonRpcRequest::new(3u64, "ping", None))
            .await
            .unwrap_err();
        assert!(err.is_connection_closed());
    }

    #[tokio::test]
    async fn test_panicking_tool_closes_only_its_session() {
        let mut registry = ToolRegistry::new(false);
        registry.register(Explode).unwrap();
        let (server, _) = embedded(registry);

        let doomed = server.connect("u1", "s1").await.unwrap();
        let err = doomed
            .request(JsonRpcRequest::new(
                1u64,
                "tools/call",
                Some(json!({"name": "explode", "arguments": {}})),
            ))
            .await
            .unwrap_err();
        assert!(err.is_connection_closed());

        let healthy = server.connect("u1", "s1").await.unwrap();
        let response = healthy
            .request(JsonRpcRequest::new(2u64, "ping", None))
            .await
            .unwrap();
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_abandoned_request_does_not_shift_responses() {
        let mut registry = ToolRegistry::new(false);
        registry.register(Sleepy).unwrap();
        let (server, _) = embedded(registry);
        let transport = server.connect("u1", "s1").await.unwrap();

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            transport.request(JsonRpcRequest::new(
                1u64,
                "tools/call",
                Some(json!({"name": "sleepy", "arguments": {}})),
            )),
        )
        .await;
        assert!(abandoned.is_err());

        let response = transport
            .request(JsonRpcRequest::new(2u64, "ping", None))
            .await
            .unwrap();
        assert_eq!(response.id, Some(2u64.into()));
        assert!(!response.is_error());
    }
}
