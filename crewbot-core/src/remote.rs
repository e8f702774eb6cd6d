//! Tagged results of calls against the repository host.
//!
//! Remote failures are values, not panics or opaque errors: every stage of the
//! commit transaction has its own [`FailureKind`], so a caller can tell exactly
//! where a transaction stopped by matching on one field.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The stage of a remote operation that failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum FailureKind {
    BaseRefNotFound,
    BlobCreateFailed { path: String },
    BaseCommitNotFound,
    TreeCreateFailed,
    CommitCreateFailed,
    RefCreateFailed,
    PrCreateFailed,
    CommentFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::BaseRefNotFound => write!(f, "base ref lookup"),
            FailureKind::BlobCreateFailed { path } => write!(f, "blob creation for {}", path),
            FailureKind::BaseCommitNotFound => write!(f, "base commit lookup"),
            FailureKind::TreeCreateFailed => write!(f, "tree creation"),
            FailureKind::CommitCreateFailed => write!(f, "commit creation"),
            FailureKind::RefCreateFailed => write!(f, "ref creation"),
            FailureKind::PrCreateFailed => write!(f, "pull request creation"),
            FailureKind::CommentFailed => write!(f, "comment creation"),
        }
    }
}

/// A failed remote call: which stage, what the host answered, and the raw body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind} failed (status {}): {details}", display_status(.status_code))]
pub struct RemoteFailure {
    #[serde(flatten)]
    pub kind: FailureKind,
    /// `None` when the request never produced an HTTP response.
    pub status_code: Option<u16>,
    pub details: String,
}

fn display_status(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl RemoteFailure {
    pub fn new(kind: FailureKind, status_code: Option<u16>, details: impl Into<String>) -> Self {
        Self {
            kind,
            status_code,
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestCreated {
    pub number: u64,
    pub url: String,
    pub branch: String,
}

/// Either a created pull request or the stage that stopped the transaction.
pub type PullRequestResult = Result<PullRequestCreated, RemoteFailure>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPosted {
    pub comment_url: String,
}

pub type CommentResult = Result<CommentPosted, RemoteFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_includes_stage_status_and_body() {
        let failure = RemoteFailure::new(
            FailureKind::BlobCreateFailed {
                path: "src/lib.rs".to_string(),
            },
            Some(422),
            "bad blob",
        );
        assert_eq!(
            failure.to_string(),
            "blob creation for src/lib.rs failed (status 422): bad blob"
        );
    }

    #[test]
    fn test_transport_failure_has_no_status() {
        let failure = RemoteFailure::new(FailureKind::CommentFailed, None, "connection refused");
        assert_eq!(
            failure.to_string(),
            "comment creation failed (status none): connection refused"
        );
    }

    #[test]
    fn test_failure_serializes_as_error_record() {
        let failure = RemoteFailure::new(FailureKind::RefCreateFailed, Some(422), "exists");
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["error"], "ref_create_failed");
        assert_eq!(value["status_code"], 422);
        assert_eq!(value["details"], "exists");

        let blob = RemoteFailure::new(
            FailureKind::BlobCreateFailed {
                path: "a.txt".to_string(),
            },
            Some(400),
            "bad blob",
        );
        let value = serde_json::to_value(&blob).unwrap();
        assert_eq!(value["error"], "blob_create_failed");
        assert_eq!(value["path"], "a.txt");
    }
}
