#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::Json,
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crewbot_core::{
    ChangeSet, CommentPosted, CommentResult, FailureKind, PullRequestCreated, PullRequestResult,
    RemoteFailure, RepoSlug,
};
use crewbot_server::orchestrator::TaskOutcome;
use crewbot_server::RepositoryHost;

/// Which GitHub endpoint a request hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BaseRef,
    Blob,
    BaseCommit,
    Tree,
    Commit,
    Ref,
    Pull,
    Comment,
    Unknown,
}

fn classify(method: &Method, path: &str) -> Stage {
    let git_path = path.splitn(5, '/').nth(4).unwrap_or("");
    match (method.as_str(), git_path) {
        ("GET", p) if p.starts_with("git/ref/heads/") => Stage::BaseRef,
        ("POST", "git/blobs") => Stage::Blob,
        ("GET", p) if p.starts_with("git/commits/") => Stage::BaseCommit,
        ("POST", "git/trees") => Stage::Tree,
        ("POST", "git/commits") => Stage::Commit,
        ("POST", "git/refs") => Stage::Ref,
        ("POST", "pulls") => Stage::Pull,
        ("POST", p) if p.starts_with("issues/") && p.ends_with("/comments") => Stage::Comment,
        _ => Stage::Unknown,
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub stage: Stage,
    pub path: String,
    pub authorization: Option<String>,
    pub correlation_id: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct FakeGitHubState {
    pub calls: Mutex<Vec<Call>>,
    /// Answer this stage with a 422.
    pub fail: Option<Stage>,
    /// Answer this stage with a 200 whose body lacks the expected fields.
    pub malformed: Option<Stage>,
}

impl FakeGitHubState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls().into_iter().map(|c| c.stage).collect()
    }
}

async fn handle(
    State(state): State<Arc<FakeGitHubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    let stage = classify(&method, &path);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let blob_count = {
        let mut calls = state.calls.lock().unwrap();
        calls.push(Call {
            stage,
            path: path.clone(),
            authorization: header("authorization"),
            correlation_id: header("x-correlation-id"),
            body: body.clone(),
        });
        calls.iter().filter(|c| c.stage == Stage::Blob).count()
    };

    if state.fail == Some(stage) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": format!("{:?} rejected", stage) })),
        );
    }
    if state.malformed == Some(stage) {
        return (StatusCode::OK, Json(json!({ "unexpected": true })));
    }

    let response = match stage {
        Stage::BaseRef => json!({ "ref": "refs/heads/main", "object": { "sha": "base-sha" } }),
        Stage::Blob => json!({ "sha": format!("blob-{}", blob_count) }),
        Stage::BaseCommit => json!({ "sha": "base-sha", "tree": { "sha": "base-tree" } }),
        Stage::Tree => json!({ "sha": "new-tree" }),
        Stage::Commit => json!({ "sha": "new-commit" }),
        Stage::Ref => json!({ "ref": body["ref"], "object": { "sha": body["sha"] } }),
        Stage::Pull => json!({
            "number": 42,
            "html_url": "https://github.com/acme/widgets/pull/42"
        }),
        Stage::Comment => json!({
            "id": 1,
            "html_url": format!("https://github.com{}#issuecomment-1", path)
        }),
        Stage::Unknown => return (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))),
    };
    let status = if method == Method::POST {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}

/// Serve a fake GitHub API on an ephemeral port. Returns its base URL.
pub async fn spawn_fake_github(state: FakeGitHubState) -> (String, Arc<FakeGitHubState>) {
    let state = Arc::new(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(handle).with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

/// A base URL nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub repo: String,
    pub pr_number: u64,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct OpenedPullRequest {
    pub repo: String,
    pub branch: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub changes: ChangeSet,
}

/// Repository host double that records every call.
#[derive(Default)]
pub struct RecordingHost {
    pub comments: Mutex<Vec<PostedComment>>,
    pub pull_requests: Mutex<Vec<OpenedPullRequest>>,
    pub fail_comments: bool,
}

impl RecordingHost {
    pub fn failing_comments() -> Self {
        Self {
            fail_comments: true,
            ..Self::default()
        }
    }

    pub fn comments(&self) -> Vec<PostedComment> {
        self.comments.lock().unwrap().clone()
    }

    pub fn pull_requests(&self) -> Vec<OpenedPullRequest> {
        self.pull_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryHost for RecordingHost {
    async fn create_branch_and_pr(
        &self,
        _correlation_id: Option<&str>,
        repo: &RepoSlug,
        branch_name: &str,
        base: &str,
        title: &str,
        body: &str,
        changes: &ChangeSet,
    ) -> PullRequestResult {
        let mut pull_requests = self.pull_requests.lock().unwrap();
        pull_requests.push(OpenedPullRequest {
            repo: repo.to_string(),
            branch: branch_name.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            changes: changes.clone(),
        });
        Ok(PullRequestCreated {
            number: 100 + pull_requests.len() as u64,
            url: format!("https://github.com/{}/pull/{}", repo, 100 + pull_requests.len()),
            branch: branch_name.to_string(),
        })
    }

    async fn comment_on_pr(
        &self,
        _correlation_id: Option<&str>,
        repo: &RepoSlug,
        pr_number: u64,
        body: &str,
    ) -> CommentResult {
        if self.fail_comments {
            return Err(RemoteFailure::new(
                FailureKind::CommentFailed,
                Some(403),
                "Resource not accessible by integration",
            ));
        }

        let mut comments = self.comments.lock().unwrap();
        comments.push(PostedComment {
            repo: repo.to_string(),
            pr_number,
            body: body.to_string(),
        });
        Ok(CommentPosted {
            comment_url: format!(
                "https://github.com/{}/pull/{}#issuecomment-{}",
                repo,
                pr_number,
                comments.len()
            ),
        })
    }
}

/// Wait for exactly `count` outcomes, failing the test after five seconds.
pub async fn collect_outcomes(
    receiver: &mut mpsc::UnboundedReceiver<TaskOutcome>,
    count: usize,
) -> Vec<TaskOutcome> {
    let mut outcomes = Vec::with_capacity(count);
    while outcomes.len() < count {
        let outcome = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for task outcomes")
            .expect("outcome channel closed");
        outcomes.push(outcome);
    }
    outcomes
}
