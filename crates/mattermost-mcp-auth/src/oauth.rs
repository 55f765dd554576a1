//! OAuth bearer token provider (resource-server side).

use crate::context::AuthContext;
use crate::error::{AuthError, AuthResult};
use crate::provider::AuthenticationProvider;
use async_trait::async_trait;
use mattermost_mcp_core::{ClientFactory, MattermostClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Accepts the bearer token presented by the caller and forwards it to
/// Mattermost.
///
/// Tokens are not introspected or signature-checked here. Mattermost rejects
/// bad tokens on the first upstream call, which surfaces as a tool error.
pub struct OAuthAuthProvider {
    factory: Arc<dyn ClientFactory>,
    warned: AtomicBool,
}

impl OAuthAuthProvider {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            warned: AtomicBool::new(false),
        }
    }

    fn bearer<'a>(&self, ctx: &'a AuthContext) -> AuthResult<&'a str> {
        match ctx {
            AuthContext::Bearer(token) if !token.trim().is_empty() => Ok(token.trim()),
            AuthContext::Bearer(_) => Err(AuthError::MissingCredentials(
                "bearer token is empty".to_string(),
            )),
            other => Err(AuthError::UnsupportedContext {
                provider: "oauth",
                context: other.kind(),
            }),
        }
    }
}

#[async_trait]
impl AuthenticationProvider for OAuthAuthProvider {
    fn name(&self) -> &'static str {
        "oauth"
    }

    async fn validate_auth(&self, ctx: &AuthContext) -> AuthResult<()> {
        self.bearer(ctx)?;
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("Bearer tokens are accepted without introspection; Mattermost validates them on first use");
        }
        Ok(())
    }

    async fn authenticated_client(&self, ctx: &AuthContext) -> AuthResult<Arc<dyn MattermostClient>> {
        let token = self.bearer(ctx)?;
        Ok(self.factory.client_for_token(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mattermost_mcp_test_utils::{fixtures, MockClientFactory, MockMattermostClient};

    fn provider(factory: MockClientFactory) -> OAuthAuthProvider {
        OAuthAuthProvider::new(Arc::new(factory))
    }

    #[tokio::test]
    async fn test_validate_checks_presence_only() {
        let mock = MockMattermostClient::new();
        let factory = MockClientFactory::new().with_client("tok", mock.clone());
        let provider = provider(factory.clone());

        provider
            .validate_auth(&AuthContext::Bearer("tok".to_string()))
            .await
            .unwrap();
        assert!(mock.calls().is_empty());
        assert!(factory.requested_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_empty_bearer_is_missing() {
        let provider = provider(MockClientFactory::new());
        let err = provider
            .validate_auth(&AuthContext::Bearer(" ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_other_contexts_are_refused() {
        let provider = provider(MockClientFactory::new());
        let err = provider
            .authenticated_client(&AuthContext::Pat("pat".to_string()))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AuthError::UnsupportedContext {
                provider: "oauth",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_client_uses_presented_token() {
        let mock = MockMattermostClient::new().with_me(fixtures::user("u9", "oauth-user"));
        let factory = MockClientFactory::new().with_client("tok", mock);
        let provider = provider(factory.clone());

        let client = provider
            .authenticated_client(&AuthContext::Bearer("tok".to_string()))
            .await
            .unwrap();
        assert_eq!(client.get_me().await.unwrap().id, "u9");
        assert_eq!(factory.requested_tokens(), vec!["tok"]);
    }
}
