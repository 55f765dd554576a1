//! Loading attachment sources (local paths or URLs).
//!
//! Reachable from `create_post` only under local access.

use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Mattermost accepts at most this many files per post.
pub(crate) const MAX_ATTACHMENTS: usize = 10;

/// Largest file we read or download.
const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

/// A loaded file ready for upload.
#[derive(Debug)]
pub(crate) struct Attachment {
    pub name: String,
    pub data: Vec<u8>,
}

pub(crate) async fn load(ctx: &ToolContext, source: &str) -> ToolResult<Attachment> {
    let source = source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch(ctx, source).await
    } else {
        read_local(source).await
    }
}

async fn read_local(source: &str) -> ToolResult<Attachment> {
    let path = Path::new(source);
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ToolError::execution(format!("cannot read attachment '{}': {}", source, e)))?;
    if !metadata.is_file() {
        return Err(ToolError::validation(format!(
            "attachment '{}' is not a regular file",
            source
        )));
    }
    if metadata.len() as usize > MAX_ATTACHMENT_BYTES {
        return Err(too_large(source));
    }

    let data = tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::execution(format!("cannot read attachment '{}': {}", source, e)))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    debug!(path = %source, bytes = data.len(), "Read local attachment");
    Ok(Attachment { name, data })
}

async fn fetch(ctx: &ToolContext, source: &str) -> ToolResult<Attachment> {
    let url = Url::parse(source)
        .map_err(|e| ToolError::validation(format!("invalid attachment URL '{}': {}", source, e)))?;

    let response = ctx
        .http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| ToolError::execution(format!("failed to fetch '{}': {}", source, e)))?;
    if !response.status().is_success() {
        return Err(ToolError::execution(format!(
            "failed to fetch '{}': server returned {}",
            source,
            response.status()
        )));
    }
    if response
        .content_length()
        .is_some_and(|len| len as usize > MAX_ATTACHMENT_BYTES)
    {
        return Err(too_large(source));
    }

    let data = response
        .bytes()
        .await
        .map_err(|e| ToolError::execution(format!("failed to fetch '{}': {}", source, e)))?;
    if data.len() > MAX_ATTACHMENT_BYTES {
        return Err(too_large(source));
    }

    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .unwrap_or_else(|| "attachment".to_string());

    debug!(url = %source, bytes = data.len(), "Fetched attachment");
    Ok(Attachment {
        name,
        data: data.to_vec(),
    })
}

fn too_large(source: &str) -> ToolError {
    ToolError::validation(format!(
        "attachment '{}' exceeds the {} MiB limit",
        source,
        MAX_ATTACHMENT_BYTES / (1024 * 1024)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mattermost_mcp_core::AccessMode;
    use mattermost_mcp_test_utils::MockMattermostClient;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> ToolContext {
        ToolContext::new(Arc::new(MockMattermostClient::new()), AccessMode::Local, reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.txt");
        std::fs::write(&file, b"quarterly numbers").unwrap();

        let attachment = load(&ctx(), file.to_str().unwrap()).await.unwrap();
        assert_eq!(attachment.name, "report.txt");
        assert_eq!(attachment.data, b"quarterly numbers");
    }

    #[tokio::test]
    async fn test_missing_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        assert!(load(&ctx(), missing.to_str().unwrap()).await.is_err());

        let err = load(&ctx(), dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[tokio::test]
    async fn test_fetches_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/diagram.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let url = format!("{}/files/diagram.png", server.uri());
        let attachment = load(&ctx(), &url).await.unwrap();
        assert_eq!(attachment.name, "diagram.png");
        assert_eq!(attachment.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = load(&ctx(), &format!("{}/missing.pdf", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
