// Client for the GitHub repository contents API: read one file, then commit a
// new version of it guarded by the sha that was read.

use crate::error::{DeployError, Result};
use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

static USER_AGENT: &str = concat!("deploy-stamp/", env!("CARGO_PKG_VERSION"));
static GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Where the stamped file lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLocation {
    pub owner: String,
    pub repo: String,
    pub path: String,
    /// `None` means the repository's default branch.
    pub branch: Option<String>,
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}:{}", self.owner, self.repo, self.path)?;
        if let Some(branch) = &self.branch {
            write!(f, "@{}", branch)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

/// A file as read from the remote: decoded text plus the sha needed to
/// update it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    pub sha: String,
}

#[async_trait]
pub trait ContentClient: Send + Sync {
    async fn fetch_file(&self, location: &FileLocation) -> Result<RemoteFile>;

    /// Commits `content` over the revision identified by `sha`. The remote
    /// rejects the write if the file has moved on since.
    async fn write_file(&self, location: &FileLocation, sha: &str, content: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    committer: &'a Committer,
}

/// Decodes the contents API's base64 payload, which arrives split into
/// newline-separated chunks.
pub fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(compact)
        .map_err(|e| DeployError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DeployError::Decode(e.to_string()))
}

pub fn encode_content(content: &str) -> String {
    BASE64_STANDARD.encode(content.as_bytes())
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
    commit_message: String,
    committer: Committer,
}

impl GitHubClient {
    pub fn new(
        token: &str,
        api_base: &str,
        commit_message: &str,
        committer: Committer,
        timeout: Duration,
    ) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| DeployError::InvalidApiBase(format!("{}: {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(DeployError::InvalidApiBase(api_base.to_string()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| DeployError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_base,
            commit_message: commit_message.to_string(),
            committer,
        })
    }

    /// `{api_base}/repos/{owner}/{repo}/contents/{path}`, with every segment
    /// percent-encoded. Slashes in `path` separate segments.
    pub fn contents_url(&self, location: &FileLocation) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| DeployError::InvalidApiBase(self.api_base.to_string()))?
            .pop_if_empty()
            .extend([
                "repos",
                location.owner.as_str(),
                location.repo.as_str(),
                "contents",
            ])
            .extend(location.path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

#[async_trait]
impl ContentClient for GitHubClient {
    async fn fetch_file(&self, location: &FileLocation) -> Result<RemoteFile> {
        let url = self.contents_url(location)?;
        tracing::info!(%url, "GET file");

        let mut request = self.http.get(url);
        if let Some(branch) = &location.branch {
            request = request.query(&[("ref", branch)]);
        }
        let res = request.send().await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "reading file failed");
            return Err(DeployError::RemoteRead {
                status: status.as_u16(),
            });
        }

        let contents: ContentsResponse = res.json().await?;
        Ok(RemoteFile {
            content: decode_content(&contents.content)?,
            sha: contents.sha,
        })
    }

    async fn write_file(&self, location: &FileLocation, sha: &str, content: &str) -> Result<()> {
        let url = self.contents_url(location)?;
        tracing::info!(%url, sha, "PUT file");

        let body = UpdateRequest {
            message: &self.commit_message,
            content: encode_content(content),
            sha,
            branch: location.branch.as_deref(),
            committer: &self.committer,
        };
        let res = self.http.put(url).json(&body).send().await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "committing file failed");
            return Err(DeployError::RemoteWrite {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
