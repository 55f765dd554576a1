//! Per-request authentication context.

use crate::error::AuthResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Maps a host session id to a bearer token.
///
/// Supplied by the embedding host; the server never stores the mapping itself.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve_token(&self, session_id: &str) -> AuthResult<String>;
}

/// Credentials of one caller.
///
/// Lives for one HTTP request, one stdio process or one embedded session.
#[derive(Clone)]
pub enum AuthContext {
    /// Static personal access token.
    Pat(String),
    /// OAuth bearer token presented by the caller.
    Bearer(String),
    /// Host session id plus the resolver that turns it into a token.
    Session {
        session_id: String,
        resolver: Arc<dyn TokenResolver>,
    },
}

impl AuthContext {
    pub fn session(session_id: impl Into<String>, resolver: Arc<dyn TokenResolver>) -> Self {
        AuthContext::Session {
            session_id: session_id.into(),
            resolver,
        }
    }

    /// Short name of the credential kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthContext::Pat(_) => "personal access token",
            AuthContext::Bearer(_) => "bearer token",
            AuthContext::Session { .. } => "session",
        }
    }

    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let (scheme, token) = value.trim().split_once(' ')?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return None;
        }
        Some(AuthContext::Bearer(token.to_string()))
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthContext::Pat(_) => f.write_str("AuthContext::Pat(<redacted>)"),
            AuthContext::Bearer(_) => f.write_str("AuthContext::Bearer(<redacted>)"),
            AuthContext::Session { session_id, .. } => f
                .debug_struct("AuthContext::Session")
                .field("session_id", session_id)
                .finish_non_exhaustive(),
        }
    }
}
