//! Provider capability traits.

use crate::context::AuthContext;
use crate::error::AuthResult;
use async_trait::async_trait;
use mattermost_mcp_core::{MattermostClient, User};
use std::sync::Arc;

/// Validates credentials and produces an authenticated Mattermost client.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Check that the context carries usable credentials.
    async fn validate_auth(&self, ctx: &AuthContext) -> AuthResult<()>;

    /// A client acting with the context's credentials.
    async fn authenticated_client(&self, ctx: &AuthContext) -> AuthResult<Arc<dyn MattermostClient>>;
}

/// Providers that can also say *who* the credentials belong to.
///
/// The embedded transport requires this to refuse callers presenting someone
/// else's session.
#[async_trait]
pub trait UserIdentityProvider: AuthenticationProvider {
    async fn authenticated_user(&self, ctx: &AuthContext) -> AuthResult<User>;
}
