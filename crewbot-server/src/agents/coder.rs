use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use uuid::Uuid;

use crate::host::RepositoryHost;
use crewbot_core::{ChangeSet, PullRequestResult, RepoSlug};

/// Turns a fix instruction into concrete file edits.
#[async_trait]
pub trait FixProducer: Send + Sync {
    async fn produce_fix(&self, repo: &RepoSlug, instruction: &str) -> ChangeSet;
}

/// Always proposes the same single-file edit.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderFixProducer;

#[async_trait]
impl FixProducer for PlaceholderFixProducer {
    async fn produce_fix(&self, _repo: &RepoSlug, _instruction: &str) -> ChangeSet {
        ChangeSet::new().with_file("src/example.py", "# example fix\n")
    }
}

/// `agent/auto-fix-<unix seconds>-<8 hex chars>`, unique per call.
pub fn auto_fix_branch_name() -> String {
    let unix_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    branch_name_from(unix_seconds, Uuid::new_v4())
}

fn branch_name_from(unix_seconds: u64, nonce: Uuid) -> String {
    let simple = nonce.simple().to_string();
    format!("agent/auto-fix-{}-{}", unix_seconds, &simple[..8])
}

#[derive(Clone)]
pub struct CoderAgent {
    host: Arc<dyn RepositoryHost>,
}

impl CoderAgent {
    pub fn new(host: Arc<dyn RepositoryHost>) -> Self {
        Self { host }
    }

    pub async fn create_fix_pr(
        &self,
        correlation_id: Option<&str>,
        repo: &RepoSlug,
        base: &str,
        changes: &ChangeSet,
        title: &str,
        body: &str,
    ) -> PullRequestResult {
        let branch = auto_fix_branch_name();
        info!(
            "Creating fix branch {} from {} in {} ({} files)",
            branch,
            base,
            repo,
            changes.len()
        );

        let result = self
            .host
            .create_branch_and_pr(correlation_id, repo, &branch, base, title, body, changes)
            .await;

        if let Err(failure) = &result {
            warn!("Auto-fix for {} stopped: {}", repo, failure);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_shape() {
        let nonce = Uuid::parse_str("0123abcd-0000-4000-8000-000000000000").unwrap();
        assert_eq!(
            branch_name_from(1_700_000_000, nonce),
            "agent/auto-fix-1700000000-0123abcd"
        );
    }

    #[test]
    fn test_branch_names_differ_within_one_second() {
        assert_ne!(auto_fix_branch_name(), auto_fix_branch_name());
    }

    #[tokio::test]
    async fn test_placeholder_fix_touches_one_file() {
        let changes = PlaceholderFixProducer
            .produce_fix(&RepoSlug::new("acme", "widgets"), "fix it")
            .await;
        assert_eq!(
            changes.iter().collect::<Vec<_>>(),
            vec![("src/example.py", "# example fix\n")]
        );
    }
}
