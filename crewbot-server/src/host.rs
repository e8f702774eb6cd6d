//! The seam between agent handlers and the code host.
//!
//! Handlers only ever see `Arc<dyn RepositoryHost>`, so tests can swap the
//! GitHub client for a double that records calls.

use async_trait::async_trait;
use crewbot_core::{ChangeSet, CommentResult, PullRequestResult, RepoSlug};

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Commit `changes` on a new branch cut from `base` and open a pull request.
    ///
    /// Stops at the first failing stage and reports it; no later stage runs.
    #[allow(clippy::too_many_arguments)]
    async fn create_branch_and_pr(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        branch_name: &str,
        base: &str,
        title: &str,
        body: &str,
        changes: &ChangeSet,
    ) -> PullRequestResult;

    /// Post a top-level comment on a pull request.
    async fn comment_on_pr(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        pr_number: u64,
        body: &str,
    ) -> CommentResult;
}
