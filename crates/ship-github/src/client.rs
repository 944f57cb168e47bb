//! GitHub v3 REST client
//!
//! Every request is authenticated with the configured token. Status codes
//! the orchestrator cares about are mapped onto typed outcomes: 404 means
//! "absent", 409/422 on a content write means the prior hash was stale, and
//! 409/422 on a branch update means the branch moved.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::{RequestBuilder, Response, StatusCode};
use ship_core::{Result, Secret, ShipConfig, ShipError};
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{ContentApi, HostingApi};
use crate::types::{
    CommitFiles, CommitRef, ContentResponse, CreateCommitRequest, CreateRepoRequest,
    CreateTreeRequest, GitCommitResponse, PagesRequest, PagesSource, PagesStatus,
    PutContentRequest, PutContentResponse, PutFile, RemoteFile, RepoHandle, RepoResponse,
    TreeEntry, UpdateRefRequest, Visibility,
};

const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("shipwright/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Client for one hosting account
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    token: Option<Secret>,
}

impl GitHubClient {
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        token: Option<Secret>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ShipError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            token,
        })
    }

    pub fn from_config(config: &ShipConfig) -> Result<Self> {
        Self::new(
            config.hosting.api_base.clone(),
            config.hosting.owner.clone(),
            config.hosting.token.clone(),
        )
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn repo_url(&self, repo: &str, suffix: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_base, self.owner, repo, suffix)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header("accept", ACCEPT)
            .header("x-github-api-version", API_VERSION);
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        self.request(builder)
            .send()
            .await
            .map_err(|e| ShipError::Http(format!("Failed to send request: {}", e)))
    }

    /// Send and decode a JSON response, mapping any failure to an HTTP error
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = self.send(builder).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ShipError::Http(format!(
                "{} failed with {}: {}",
                what,
                status,
                Self::error_body(response).await
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ShipError::Http(format!("Failed to parse response to {}: {}", what, e)))
    }

    async fn error_body(response: Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown".to_string())
    }
}

fn decode_content(encoded: &str, encoding: &str, path: &str) -> Result<String> {
    if encoding != "base64" {
        return Err(ShipError::Http(format!(
            "Unsupported content encoding '{}' for {}",
            encoding, path
        )));
    }
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(compact)
        .map_err(|e| ShipError::Http(format!("Invalid base64 content for {}: {}", path, e)))?;
    String::from_utf8(bytes)
        .map_err(|e| ShipError::Http(format!("{} is not valid UTF-8: {}", path, e)))
}

#[async_trait]
impl ContentApi for GitHubClient {
    async fn get_file(&self, repo: &str, path: &str, branch: &str) -> Result<Option<RemoteFile>> {
        let url = self.repo_url(repo, &format!("/contents/{}", path));
        debug!("GET {} (ref {})", url, branch);

        let response = self
            .send(self.http.get(&url).query(&[("ref", branch)]))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ContentResponse = response.json().await.map_err(|e| {
                    ShipError::Http(format!("Failed to parse contents response: {}", e))
                })?;
                let content = decode_content(&body.content, &body.encoding, &body.path)?;
                Ok(Some(RemoteFile {
                    path: body.path,
                    sha: body.sha,
                    content,
                }))
            }
            status => Err(ShipError::Http(format!(
                "Reading {} failed with {}: {}",
                path,
                status,
                Self::error_body(response).await
            ))),
        }
    }

    async fn put_file(&self, repo: &str, path: &str, file: PutFile) -> Result<String> {
        let url = self.repo_url(repo, &format!("/contents/{}", path));
        let body = PutContentRequest {
            message: &file.message,
            content: BASE64_STANDARD.encode(file.content.as_bytes()),
            sha: file.sha.as_deref(),
            branch: &file.branch,
            committer: file.committer.as_ref(),
        };
        debug!("PUT {} ({} bytes)", url, file.content.len());

        let response = self.send(self.http.put(&url).json(&body)).await?;
        let status = response.status();

        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ShipError::conflict(
                path,
                format!("{}: {}", status, Self::error_body(response).await),
            ));
        }
        if !status.is_success() {
            return Err(ShipError::Http(format!(
                "Writing {} failed with {}: {}",
                path,
                status,
                Self::error_body(response).await
            )));
        }

        let body: PutContentResponse = response
            .json()
            .await
            .map_err(|e| ShipError::Http(format!("Failed to parse write response: {}", e)))?;
        Ok(body.commit.sha)
    }

    async fn commit_files(&self, repo: &str, commit: CommitFiles) -> Result<String> {
        // Nothing below is visible until the branch moves in the last step
        let parent: GitCommitResponse = self
            .send_json(
                self.http
                    .get(self.repo_url(repo, &format!("/git/commits/{}", commit.parent))),
                "Reading parent commit",
            )
            .await?;

        let tree = CreateTreeRequest {
            base_tree: &parent.tree.sha,
            tree: commit
                .files
                .iter()
                .map(|(path, content)| TreeEntry {
                    path,
                    mode: "100644",
                    kind: "blob",
                    content,
                })
                .collect(),
        };
        let tree: CommitRef = self
            .send_json(
                self.http.post(self.repo_url(repo, "/git/trees")).json(&tree),
                "Creating tree",
            )
            .await?;
        debug!("Created tree {} with {} files", tree.sha, commit.files.len());

        let body = CreateCommitRequest {
            message: &commit.message,
            tree: &tree.sha,
            parents: [&commit.parent],
            author: commit.committer.as_ref(),
            committer: commit.committer.as_ref(),
        };
        let created: CommitRef = self
            .send_json(
                self.http.post(self.repo_url(repo, "/git/commits")).json(&body),
                "Creating commit",
            )
            .await?;

        let ref_path = format!("refs/heads/{}", commit.branch);
        let response = self
            .send(
                self.http
                    .patch(self.repo_url(repo, &format!("/git/{}", ref_path)))
                    .json(&UpdateRefRequest {
                        sha: &created.sha,
                        force: false,
                    }),
            )
            .await?;
        let status = response.status();

        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ShipError::conflict(
                ref_path,
                format!("{}: {}", status, Self::error_body(response).await),
            ));
        }
        if !status.is_success() {
            return Err(ShipError::Http(format!(
                "Moving {} failed with {}: {}",
                ref_path,
                status,
                Self::error_body(response).await
            )));
        }

        info!("Committed {} files to {} ({})", commit.files.len(), repo, created.sha);
        Ok(created.sha)
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn repository_exists(&self, repo: &str) -> Result<bool> {
        let response = self.send(self.http.get(self.repo_url(repo, ""))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(ShipError::Http(format!(
                "Looking up repository {} failed with {}: {}",
                repo,
                status,
                Self::error_body(response).await
            ))),
        }
    }

    async fn create_repository(&self, repo: &str, visibility: Visibility) -> Result<RepoHandle> {
        info!("Creating {:?} repository {}/{}", visibility, self.owner, repo);
        let body = CreateRepoRequest {
            name: repo,
            private: visibility == Visibility::Private,
            auto_init: false,
        };
        let response = self
            .send(
                self.http
                    .post(format!("{}/user/repos", self.api_base))
                    .json(&body),
            )
            .await?;
        let status = response.status();

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let detail = Self::error_body(response).await;
            if detail.contains("already exists") {
                info!("Repository {} already exists", repo);
                return Ok(RepoHandle {
                    name: repo.to_string(),
                    html_url: format!("https://github.com/{}/{}", self.owner, repo),
                    created: false,
                });
            }
            return Err(ShipError::Http(format!(
                "Creating repository {} failed with {}: {}",
                repo, status, detail
            )));
        }
        if !status.is_success() {
            return Err(ShipError::Http(format!(
                "Creating repository {} failed with {}: {}",
                repo,
                status,
                Self::error_body(response).await
            )));
        }

        let body: RepoResponse = response
            .json()
            .await
            .map_err(|e| ShipError::Http(format!("Failed to parse repository: {}", e)))?;
        Ok(RepoHandle {
            name: body.name,
            html_url: body.html_url,
            created: true,
        })
    }

    async fn enable_pages(&self, repo: &str, branch: &str, path: &str) -> Result<PagesStatus> {
        let body = PagesRequest {
            source: PagesSource { branch, path },
        };
        let response = self
            .send(self.http.post(self.repo_url(repo, "/pages")).json(&body))
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PagesStatus::AlreadyEnabled),
            status if status.is_success() => Ok(PagesStatus::Enabled),
            status => Err(ShipError::Http(format!(
                "Enabling pages for {} failed with {}: {}",
                repo,
                status,
                Self::error_body(response).await
            ))),
        }
    }

    async fn head_commit(&self, repo: &str, branch: &str) -> Result<Option<String>> {
        let response = self
            .send(
                self.http
                    .get(self.repo_url(repo, &format!("/commits/{}", branch))),
            )
            .await?;

        match response.status() {
            // 409 is returned for a repository without commits
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Ok(None),
            status if status.is_success() => {
                let body: CommitRef = response
                    .json()
                    .await
                    .map_err(|e| ShipError::Http(format!("Failed to parse commit: {}", e)))?;
                Ok(Some(body.sha))
            }
            status => Err(ShipError::Http(format!(
                "Reading head of {} failed with {}: {}",
                repo,
                status,
                Self::error_body(response).await
            ))),
        }
    }
}
