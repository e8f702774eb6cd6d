use serde::{Deserialize, Serialize};
use std::fmt;

/// What a test run was executed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestTarget {
    PullRequest(u64),
    Branch(String),
}

impl TestTarget {
    /// Artifact store key under which a report for this target is published.
    pub fn artifact_key(&self) -> String {
        match self {
            TestTarget::PullRequest(number) => pr_artifact_key(*number),
            TestTarget::Branch(name) => format!("branch-{}", name),
        }
    }
}

impl fmt::Display for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestTarget::PullRequest(number) => write!(f, "PR #{}", number),
            TestTarget::Branch(name) => write!(f, "branch {}", name),
        }
    }
}

pub fn pr_artifact_key(pr_number: u64) -> String {
    format!("pr-{}", pr_number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a test run. Always well-formed: a runner that cannot produce a
/// verdict reports `Failed` with the reason in `logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub target: TestTarget,
    pub status: TestStatus,
    pub logs: String,
}

impl TestReport {
    pub fn passed(target: TestTarget, logs: impl Into<String>) -> Self {
        Self {
            target,
            status: TestStatus::Passed,
            logs: logs.into(),
        }
    }

    pub fn failed(target: TestTarget, logs: impl Into<String>) -> Self {
        Self {
            target,
            status: TestStatus::Failed,
            logs: logs.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocker,
    Suggestion,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Blocker => write!(f, "blocker"),
            Severity::Suggestion => write!(f, "suggestion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub comment: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub summary: String,
    pub comments: Vec<ReviewComment>,
    pub approve: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_keys() {
        assert_eq!(TestTarget::PullRequest(7).artifact_key(), "pr-7");
        assert_eq!(
            TestTarget::Branch("agent/auto-fix-1".to_string()).artifact_key(),
            "branch-agent/auto-fix-1"
        );
    }

    #[test]
    fn test_report_round_trips_through_json_payload() {
        let report = TestReport::failed(TestTarget::PullRequest(3), "2 tests failed");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["target"]["pull_request"], 3);

        let back: TestReport = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }
}
