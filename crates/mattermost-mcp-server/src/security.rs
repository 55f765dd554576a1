//! Browser-facing protections: Origin allow-list, CORS and security headers.

use crate::config::HttpServerConfig;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use url::Url;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type, Accept, Mcp-Session-Id, Mcp-Protocol-Version";
const EXPOSED_HEADERS: &str = "WWW-Authenticate, Mcp-Session-Id";

/// Normalise an origin to lowercase `scheme://host[:port]`.
///
/// Default ports are dropped and IPv6 brackets kept, so
/// `https://[2001:db8::1]:443` and `https://[2001:db8::1]` compare equal.
pub fn normalize_origin(origin: &str) -> Option<String> {
    let url = Url::parse(origin.trim()).ok()?;
    let host = url.host_str()?;
    let mut normalized = format!("{}://{}", url.scheme(), host.to_ascii_lowercase());
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{}", port));
    }
    Some(normalized)
}

/// Origins a browser may call this server from.
#[derive(Debug, Clone)]
pub struct OriginAllowList {
    origins: HashSet<String>,
}

impl OriginAllowList {
    pub fn new<'a>(origins: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            origins: origins.into_iter().filter_map(normalize_origin).collect(),
        }
    }

    /// Mattermost, the site URL and loopback hosts (bare and on the
    /// configured port).
    pub fn for_config(config: &HttpServerConfig) -> Self {
        let mut candidates = vec![config.mattermost_url.clone()];
        candidates.extend(config.site_url.clone());
        for host in ["localhost", "127.0.0.1", "[::1]"] {
            candidates.push(format!("http://{}", host));
            candidates.push(format!("http://{}:{}", host, config.port));
        }
        Self::new(candidates.iter().map(String::as_str))
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        normalize_origin(origin).is_some_and(|o| self.origins.contains(&o))
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

fn origin_of(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or_default().to_string())
}

/// Reject requests whose `Origin` is not on the allow-list. Requests without
/// an `Origin` header pass.
pub async fn validate_origin(
    State(allow): State<Arc<OriginAllowList>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = origin_of(&request) {
        if !allow.is_allowed(&origin) {
            warn!(origin = %origin, path = %request.uri().path(), "Rejected request from disallowed origin");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "origin not allowed"})),
            )
                .into_response();
        }
    }
    next.run(request).await
}

/// Add the fixed security headers to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    response
}

/// CORS for origins that passed [`validate_origin`]. Preflights are answered
/// here with 204.
pub async fn cors(
    State(allow): State<Arc<OriginAllowList>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = origin_of(&request).filter(|o| allow.is_allowed(o));
    let Some(origin) = origin.and_then(|o| HeaderValue::from_str(&o).ok()) else {
        return next.run(request).await;
    };

    let mut response = if request.method() == Method::OPTIONS {
        let mut preflight = Response::new(Body::empty());
        *preflight.status_mut() = StatusCode::NO_CONTENT;
        preflight
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert(origin);
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("600"),
    );
    response
}
