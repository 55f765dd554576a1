//! Host session provider.

use crate::context::AuthContext;
use crate::error::{AuthError, AuthResult};
use crate::provider::{AuthenticationProvider, UserIdentityProvider};
use async_trait::async_trait;
use mattermost_mcp_core::{ClientFactory, MattermostClient, User};
use std::sync::Arc;
use tracing::debug;

/// Resolves a host session id to a bearer token and checks it is live.
pub struct SessionAuthProvider {
    factory: Arc<dyn ClientFactory>,
}

impl SessionAuthProvider {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory }
    }

    async fn resolve(&self, ctx: &AuthContext) -> AuthResult<Arc<dyn MattermostClient>> {
        let AuthContext::Session {
            session_id,
            resolver,
        } = ctx
        else {
            return Err(AuthError::UnsupportedContext {
                provider: "session",
                context: ctx.kind(),
            });
        };

        if session_id.is_empty() {
            return Err(AuthError::MissingCredentials("session id is empty".to_string()));
        }

        let token = resolver.resolve_token(session_id).await?;
        if token.is_empty() {
            return Err(AuthError::SessionResolution(format!(
                "no token for session {}",
                session_id
            )));
        }
        debug!(session_id = %session_id, "Resolved session token");
        Ok(self.factory.client_for_token(&token))
    }
}

#[async_trait]
impl AuthenticationProvider for SessionAuthProvider {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn validate_auth(&self, ctx: &AuthContext) -> AuthResult<()> {
        self.authenticated_user(ctx).await.map(|_| ())
    }

    async fn authenticated_client(&self, ctx: &AuthContext) -> AuthResult<Arc<dyn MattermostClient>> {
        self.resolve(ctx).await
    }
}

#[async_trait]
impl UserIdentityProvider for SessionAuthProvider {
    async fn authenticated_user(&self, ctx: &AuthContext) -> AuthResult<User> {
        let client = self.resolve(ctx).await?;
        Ok(client.get_me().await?)
    }
}
