//! Static personal access token provider.

use crate::context::AuthContext;
use crate::error::{AuthError, AuthResult};
use crate::provider::AuthenticationProvider;
use async_trait::async_trait;
use mattermost_mcp_core::{ClientFactory, MattermostClient};
use std::sync::Arc;
use tracing::{debug, info};

/// Authenticates every call with one configured personal access token.
///
/// The context is not consulted: the token belongs to the process, not to a
/// request.
pub struct TokenAuthProvider {
    client: Arc<dyn MattermostClient>,
}

impl TokenAuthProvider {
    pub fn new(token: &str, factory: &dyn ClientFactory) -> AuthResult<Self> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingCredentials(
                "personal access token is empty".to_string(),
            ));
        }
        Ok(Self {
            client: factory.client_for_token(token.trim()),
        })
    }
}

#[async_trait]
impl AuthenticationProvider for TokenAuthProvider {
    fn name(&self) -> &'static str {
        "token"
    }

    async fn validate_auth(&self, _ctx: &AuthContext) -> AuthResult<()> {
        let me = self.client.get_me().await?;
        info!(user_id = %me.id, username = %me.username, "Token validated");
        Ok(())
    }

    async fn authenticated_client(&self, ctx: &AuthContext) -> AuthResult<Arc<dyn MattermostClient>> {
        debug!(context = ctx.kind(), "Using configured personal access token");
        Ok(self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mattermost_mcp_test_utils::{fixtures, MockClientFactory, MockMattermostClient};

    #[tokio::test]
    async fn test_validate_calls_get_me_once() {
        let mock = MockMattermostClient::new().with_me(fixtures::user("u1", "alice"));
        let factory = MockClientFactory::new().with_client("pat", mock.clone());
        let provider = TokenAuthProvider::new("pat", &factory).unwrap();

        provider
            .validate_auth(&AuthContext::Pat("pat".to_string()))
            .await
            .unwrap();
        assert_eq!(mock.calls(), vec!["get_me"]);
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let factory = MockClientFactory::new();
        let provider = TokenAuthProvider::new("bogus", &factory).unwrap();

        let err = provider
            .validate_auth(&AuthContext::Pat("bogus".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_empty_token_is_refused() {
        let factory = MockClientFactory::new();
        assert!(matches!(
            TokenAuthProvider::new("   ", &factory),
            Err(AuthError::MissingCredentials(_))
        ));
    }

    #[tokio::test]
    async fn test_client_is_built_once() {
        let factory = MockClientFactory::new()
            .with_client("pat", MockMattermostClient::new().with_me(fixtures::user("u1", "a")));
        let provider = TokenAuthProvider::new("pat", &factory).unwrap();
        let ctx = AuthContext::Pat("pat".to_string());

        provider.authenticated_client(&ctx).await.unwrap();
        provider.authenticated_client(&ctx).await.unwrap();
        assert_eq!(factory.requested_tokens(), vec!["pat"]);
    }
}
