use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::host::RepositoryHost;
use crate::recording::{RecordingLogger, RecordingMiddleware, CORRELATION_ID_HEADER};
use crewbot_core::{
    ChangeSet, CommentPosted, CommentResult, FailureKind, PullRequestCreated, PullRequestResult,
    RemoteFailure, RepoSlug,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("crewbot/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

/// GitHub REST client for the git-data commit transaction and PR comments.
///
/// Owns one pooled HTTP client. [`GitHubClient::close`] consumes it.
pub struct GitHubClient {
    client: ClientWithMiddleware,
    api_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct CreateBlobRequest<'a> {
    content: &'a str,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct TreeEntry<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    entry_type: &'static str,
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateTreeRequest<'a> {
    base_tree: String,
    tree: Vec<TreeEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct CreateCommitRequest<'a> {
    message: &'a str,
    tree: String,
    parents: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateCommentRequest<'a> {
    pub body: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    html_url: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::new_with_recording(token, DEFAULT_API_URL, DEFAULT_TIMEOUT, None)
    }

    pub fn new_with_recording(
        token: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
        recording_logger: Option<RecordingLogger>,
    ) -> Result<Self> {
        let client = create_github_client(recording_logger, timeout)?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Release the connection pool. Consuming `self` rules out a second close.
    pub fn close(self) {
        drop(self.client);
        info!("GitHub client closed");
    }

    fn repo_url(&self, repo: &RepoSlug, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, repo.owner, repo.name, path
        )
    }

    fn authorized(&self, builder: RequestBuilder, correlation_id: Option<&str>) -> RequestBuilder {
        let builder = builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", ACCEPT);

        match correlation_id {
            Some(cid) => builder.header(CORRELATION_ID_HEADER, cid),
            None => builder,
        }
    }

    /// Send a request and decode a 2xx body, tagging every failure with `kind`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        correlation_id: Option<&str>,
        kind: FailureKind,
    ) -> Result<T, RemoteFailure> {
        let response = match self.authorized(builder, correlation_id).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("GitHub request for {} failed to send: {}", kind, e);
                return Err(RemoteFailure::new(kind, None, e.to_string()));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to read GitHub response body for {}: {}", kind, e);
                return Err(RemoteFailure::new(
                    kind,
                    Some(status.as_u16()),
                    format!("failed to read response body: {}", e),
                ));
            }
        };

        if !status.is_success() {
            error!("GitHub API error: {} - {}", status, text);
            return Err(RemoteFailure::new(kind, Some(status.as_u16()), text));
        }

        serde_json::from_str(&text).map_err(|e| {
            error!("Unexpected GitHub response for {}: {}", kind, e);
            RemoteFailure::new(
                kind,
                Some(status.as_u16()),
                format!("unexpected response body: {}", e),
            )
        })
    }

    async fn get_base_sha(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        base: &str,
    ) -> Result<String, RemoteFailure> {
        let url = self.repo_url(repo, &format!("git/ref/heads/{}", base));
        info!("Resolving base branch {} in {}", base, repo);

        let reference: RefResponse = self
            .send_json(
                self.client.get(&url),
                correlation_id,
                FailureKind::BaseRefNotFound,
            )
            .await?;
        Ok(reference.object.sha)
    }

    async fn create_blob(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        path: &str,
        content: &str,
    ) -> Result<String, RemoteFailure> {
        let url = self.repo_url(repo, "git/blobs");
        info!("Creating blob for {} in {}", path, repo);

        let blob: ShaResponse = self
            .send_json(
                self.client.post(&url).json(&CreateBlobRequest {
                    content,
                    encoding: "utf-8",
                }),
                correlation_id,
                FailureKind::BlobCreateFailed {
                    path: path.to_string(),
                },
            )
            .await?;
        Ok(blob.sha)
    }

    async fn get_base_tree_sha(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        base_sha: &str,
    ) -> Result<String, RemoteFailure> {
        let url = self.repo_url(repo, &format!("git/commits/{}", base_sha));
        info!("Fetching base commit {} in {}", base_sha, repo);

        let commit: CommitResponse = self
            .send_json(
                self.client.get(&url),
                correlation_id,
                FailureKind::BaseCommitNotFound,
            )
            .await?;
        Ok(commit.tree.sha)
    }

    async fn create_tree(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        base_tree: String,
        tree: Vec<TreeEntry<'_>>,
    ) -> Result<String, RemoteFailure> {
        let url = self.repo_url(repo, "git/trees");
        info!("Creating tree with {} entries in {}", tree.len(), repo);

        let created: ShaResponse = self
            .send_json(
                self.client
                    .post(&url)
                    .json(&CreateTreeRequest { base_tree, tree }),
                correlation_id,
                FailureKind::TreeCreateFailed,
            )
            .await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        message: &str,
        tree: String,
        parent: String,
    ) -> Result<String, RemoteFailure> {
        let url = self.repo_url(repo, "git/commits");
        info!("Creating commit in {}", repo);

        let commit: ShaResponse = self
            .send_json(
                self.client.post(&url).json(&CreateCommitRequest {
                    message,
                    tree,
                    parents: vec![parent],
                }),
                correlation_id,
                FailureKind::CommitCreateFailed,
            )
            .await?;
        Ok(commit.sha)
    }

    async fn create_ref(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        branch_name: &str,
        sha: String,
    ) -> Result<(), RemoteFailure> {
        let url = self.repo_url(repo, "git/refs");
        info!("Creating branch {} at {} in {}", branch_name, sha, repo);

        let _: IgnoredAny = self
            .send_json(
                self.client.post(&url).json(&CreateRefRequest {
                    ref_name: format!("refs/heads/{}", branch_name),
                    sha,
                }),
                correlation_id,
                FailureKind::RefCreateFailed,
            )
            .await?;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        request: CreatePullRequest<'_>,
    ) -> Result<PullRequestResponse, RemoteFailure> {
        let url = self.repo_url(repo, "pulls");
        info!(
            "Opening pull request {} -> {} in {}",
            request.head, request.base, repo
        );

        self.send_json(
            self.client.post(&url).json(&request),
            correlation_id,
            FailureKind::PrCreateFailed,
        )
        .await
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn create_branch_and_pr(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        branch_name: &str,
        base: &str,
        title: &str,
        body: &str,
        changes: &ChangeSet,
    ) -> PullRequestResult {
        let base_sha = self.get_base_sha(correlation_id, repo, base).await?;

        let mut tree = Vec::with_capacity(changes.len());
        for (path, content) in changes.iter() {
            let sha = self.create_blob(correlation_id, repo, path, content).await?;
            tree.push(TreeEntry {
                path,
                mode: "100644",
                entry_type: "blob",
                sha,
            });
        }

        let base_tree = self
            .get_base_tree_sha(correlation_id, repo, &base_sha)
            .await?;
        let new_tree = self
            .create_tree(correlation_id, repo, base_tree, tree)
            .await?;
        let commit_sha = self
            .create_commit(correlation_id, repo, title, new_tree, base_sha)
            .await?;
        self.create_ref(correlation_id, repo, branch_name, commit_sha)
            .await?;

        let pr = self
            .open_pull_request(
                correlation_id,
                repo,
                CreatePullRequest {
                    title,
                    head: branch_name,
                    base,
                    body,
                },
            )
            .await?;

        info!(
            "Opened pull request #{} from {} in {}: {}",
            pr.number, branch_name, repo, pr.html_url
        );

        Ok(PullRequestCreated {
            number: pr.number,
            url: pr.html_url,
            branch: branch_name.to_string(),
        })
    }

    async fn comment_on_pr(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        pr_number: u64,
        body: &str,
    ) -> CommentResult {
        let url = self.repo_url(repo, &format!("issues/{}/comments", pr_number));
        info!("Posting comment to PR #{} in {}", pr_number, repo);

        let result: Result<CommentResponse, RemoteFailure> = self
            .send_json(
                self.client.post(&url).json(&CreateCommentRequest { body }),
                correlation_id,
                FailureKind::CommentFailed,
            )
            .await;

        match result {
            Ok(comment) => {
                info!(
                    "Posted comment to PR #{} in {}: {}",
                    pr_number, repo, comment.html_url
                );
                Ok(CommentPosted {
                    comment_url: comment.html_url,
                })
            }
            Err(failure) => {
                error!(
                    "Failed to comment on PR #{} in {}: {}",
                    pr_number, repo, failure
                );
                Err(failure)
            }
        }
    }
}

pub fn create_github_client(
    recording_logger: Option<RecordingLogger>,
    timeout: Duration,
) -> Result<ClientWithMiddleware> {
    use reqwest_middleware::ClientBuilder;

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let mut builder = ClientBuilder::new(client);

    if let Some(logger) = recording_logger {
        builder = builder.with(RecordingMiddleware::new(logger));
    }

    Ok(builder.build())
}
