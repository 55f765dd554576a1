//! PKCE authorization requests.
//!
//! Only the front half of the authorization code flow: the caller sends the
//! user to [`AuthorizationRequest::url`] and keeps `state` and
//! `code_verifier` for its own token exchange.

use crate::discovery::DiscoveredAuth;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// How this client is registered with the authorization server.
#[derive(Debug, Clone, Default)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub redirect_uri: String,
    /// Space-separated scopes. Omitted from the URL when `None`.
    pub scope: Option<String>,
}

/// A ready-to-visit authorization URL and the secrets that go with it.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Generate PKCE code verifier.
pub fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// S256 code challenge of a verifier.
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate OAuth state parameter.
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Build the authorization URL for a discovered server.
pub fn build_authorization_request(
    discovered: &DiscoveredAuth,
    client: &OAuthClientConfig,
) -> AuthorizationRequest {
    let state = generate_state();
    let code_verifier = generate_code_verifier();
    let challenge = generate_code_challenge(&code_verifier);

    let endpoint = &discovered.authorization_server.authorization_endpoint;
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{}{}response_type=code&client_id={}&redirect_uri={}&state={}&code_challenge={}&code_challenge_method=S256&resource={}",
        endpoint,
        separator,
        urlencoding::encode(&client.client_id),
        urlencoding::encode(&client.redirect_uri),
        urlencoding::encode(&state),
        urlencoding::encode(&challenge),
        urlencoding::encode(&discovered.resource.resource),
    );

    if let Some(scope) = &client.scope {
        url.push_str(&format!("&scope={}", urlencoding::encode(scope)));
    }

    AuthorizationRequest {
        url,
        state,
        code_verifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::AuthorizationServerMetadata;
    use mattermost_mcp_server::ProtectedResourceMetadata;

    fn discovered() -> DiscoveredAuth {
        DiscoveredAuth {
            resource: ProtectedResourceMetadata {
                resource: "https://mcp.example.com/mcp".to_string(),
                authorization_servers: vec!["https://chat.example.com".to_string()],
                scopes_supported: None,
                resource_name: None,
                bearer_methods_supported: None,
            },
            authorization_server: AuthorizationServerMetadata {
                issuer: "https://chat.example.com".to_string(),
                authorization_endpoint: "https://chat.example.com/oauth/authorize".to_string(),
                token_endpoint: "https://chat.example.com/oauth/access_token".to_string(),
                registration_endpoint: None,
                scopes_supported: None,
                code_challenge_methods_supported: None,
            },
        }
    }

    #[test]
    fn test_code_challenge_is_s256() {
        // RFC 7636 appendix B
        assert_eq!(
            generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
        assert!(generate_code_verifier().len() >= 43);
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn test_authorization_url() {
        let request = build_authorization_request(
            &discovered(),
            &OAuthClientConfig {
                client_id: "client 1".to_string(),
                redirect_uri: "http://localhost:19876/callback".to_string(),
                scope: Some("read write".to_string()),
            },
        );

        assert!(request
            .url
            .starts_with("https://chat.example.com/oauth/authorize?response_type=code"));
        assert!(request.url.contains("client_id=client%201"));
        assert!(request
            .url
            .contains("redirect_uri=http%3A%2F%2Flocalhost%3A19876%2Fcallback"));
        assert!(request.url.contains(&format!("state={}", request.state)));
        assert!(request.url.contains(&format!(
            "code_challenge={}",
            generate_code_challenge(&request.code_verifier)
        )));
        assert!(request.url.contains("code_challenge_method=S256"));
        assert!(request
            .url
            .contains("resource=https%3A%2F%2Fmcp.example.com%2Fmcp"));
        assert!(request.url.contains("scope=read%20write"));
    }

    #[test]
    fn test_authorization_url_without_scope() {
        let request = build_authorization_request(&discovered(), &OAuthClientConfig::default());
        assert!(!request.url.contains("scope="));
    }
}
