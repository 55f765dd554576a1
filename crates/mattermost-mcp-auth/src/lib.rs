//! Authentication providers for mattermost-mcp.
//!
//! A provider turns an [`AuthContext`] into an authenticated Mattermost
//! client. There is one provider per credential kind:
//!
//! - [`TokenAuthProvider`]: a fixed personal access token (stdio)
//! - [`OAuthAuthProvider`]: an OAuth bearer token presented per request (HTTP)
//! - [`SessionAuthProvider`]: a host session id resolved to a token (embedded)
//!
//! Only the session provider implements [`UserIdentityProvider`].

mod context;
mod error;
mod oauth;
mod provider;
mod session;
mod token;

pub use context::{AuthContext, TokenResolver};
pub use error::{AuthError, AuthResult};
pub use oauth::OAuthAuthProvider;
pub use provider::{AuthenticationProvider, UserIdentityProvider};
pub use session::SessionAuthProvider;
pub use token::TokenAuthProvider;
