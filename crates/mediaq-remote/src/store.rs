//! Version-controlled store client.
//!
//! The store speaks a contents API: files are written as base64 payloads
//! with a commit message, and overwriting requires the blob revision of
//! the current content. Both operations are wrapped in the retry policy
//! from [`crate::retry`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RemoteError, RemoteResult};
use crate::retry::{with_retry, RetryConfig};

/// Store boundary the queue executor and poller talk through.
///
/// `write_file` has overwrite semantics: writing an existing path replaces
/// its content. `read_file` distinguishes a definite not-found (`None`)
/// from transport failures.
#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn write_file(&self, path: &str, content: &[u8], message: &str) -> RemoteResult<()>;

    async fn read_file(&self, path: &str) -> RemoteResult<Option<Vec<u8>>>;
}

/// Configuration for the HTTP store client.
#[derive(Debug, Clone)]
pub struct RepoStoreConfig {
    /// API base URL, e.g. `https://api.example.com`
    pub base_url: String,
    /// Repository in `owner/name` form
    pub repo: String,
    /// Branch commits land on
    pub branch: String,
    /// Bearer token
    pub token: String,
}

impl RepoStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> RemoteResult<Self> {
        Ok(Self {
            base_url: std::env::var("REMOTE_STORE_BASE_URL")
                .map_err(|_| RemoteError::config_error("REMOTE_STORE_BASE_URL not set"))?,
            repo: std::env::var("REMOTE_STORE_REPO")
                .map_err(|_| RemoteError::config_error("REMOTE_STORE_REPO not set"))?,
            branch: std::env::var("REMOTE_STORE_BRANCH").unwrap_or_else(|_| "main".to_string()),
            token: std::env::var("REMOTE_STORE_TOKEN")
                .map_err(|_| RemoteError::config_error("REMOTE_STORE_TOKEN not set"))?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// Contents-API store client over HTTP.
pub struct HttpRepoStore {
    http: Client,
    config: RepoStoreConfig,
    retry: RetryConfig,
}

impl HttpRepoStore {
    pub fn new(config: RepoStoreConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .user_agent("mediaq")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            config,
            retry: RetryConfig::default(),
        })
    }

    pub fn from_env() -> RemoteResult<Self> {
        Self::new(RepoStoreConfig::from_env()?)
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.repo,
            path
        )
    }

    /// Fetch the blob revision of an existing path, if any.
    async fn current_revision(&self, path: &str) -> RemoteResult<Option<String>> {
        let response = self
            .http
            .get(self.contents_url(path))
            .bearer_auth(&self.config.token)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let contents: ContentsResponse = response.json().await?;
        Ok(Some(contents.sha))
    }
}

#[async_trait]
impl RepoStore for HttpRepoStore {
    async fn write_file(&self, path: &str, content: &[u8], message: &str) -> RemoteResult<()> {
        let encoded = BASE64.encode(content);
        let size = content.len();
        with_retry(&self.retry, "write_file", || {
            let content = encoded.clone();
            async move {
                let sha = self.current_revision(path).await?;
                let body = PutContents {
                    message,
                    content,
                    branch: &self.config.branch,
                    sha,
                };
                let response = self
                    .http
                    .put(self.contents_url(path))
                    .bearer_auth(&self.config.token)
                    .json(&body)
                    .send()
                    .await?;
                check_status(response).await?;
                debug!(path, bytes = size, "Wrote store file");
                Ok(())
            }
        })
        .await
    }

    async fn read_file(&self, path: &str) -> RemoteResult<Option<Vec<u8>>> {
        with_retry(&self.retry, "read_file", || async move {
            let response = self
                .http
                .get(self.contents_url(path))
                .bearer_auth(&self.config.token)
                .query(&[("ref", self.config.branch.as_str())])
                .send()
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let response = check_status(response).await?;
            let contents: ContentsResponse = response.json().await?;
            let encoded = contents
                .content
                .ok_or_else(|| RemoteError::invalid_payload("response missing content field"))?;
            // The API wraps base64 at 60 columns.
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = BASE64
                .decode(compact.as_bytes())
                .map_err(|e| RemoteError::invalid_payload(format!("bad base64 content: {e}")))?;
            Ok(Some(bytes))
        })
        .await
    }
}

/// Map a non-success response to the matching error variant.
async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(RemoteError::RateLimited { retry_after_secs });
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::StatusError {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_url() {
        let store = HttpRepoStore::new(RepoStoreConfig {
            base_url: "https://api.example.com/".to_string(),
            repo: "acme/media-queue".to_string(),
            branch: "main".to_string(),
            token: "t".to_string(),
        })
        .unwrap();
        assert_eq!(
            store.contents_url("queue/abc/input.bin"),
            "https://api.example.com/repos/acme/media-queue/contents/queue/abc/input.bin"
        );
    }

    #[test]
    fn test_put_contents_skips_missing_sha() {
        let body = PutContents {
            message: "m",
            content: "YQ==".to_string(),
            branch: "main",
            sha: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("sha").is_none());
    }
}
