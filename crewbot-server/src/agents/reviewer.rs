use tracing::info;

use crewbot_core::{RepoSlug, Review, ReviewComment, Severity, TestReport};

/// Produces a review from the available test evidence.
///
/// A present, non-passing report yields one blocker and no approval. Otherwise
/// the review carries one suggestion and approves only when a passing report
/// was seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewerAgent;

impl ReviewerAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn review_pr(
        &self,
        repo: &RepoSlug,
        pr_number: Option<u64>,
        diff: Option<&str>,
        test_report: Option<&TestReport>,
    ) -> Review {
        info!(
            "Reviewing {} PR {:?} (diff: {} bytes, test report: {})",
            repo,
            pr_number,
            diff.map_or(0, str::len),
            test_report.map_or("none".to_string(), |r| r.status.to_string())
        );

        let summary = match pr_number {
            Some(number) => format!("Automated review for PR #{}.", number),
            None => "Automated review.".to_string(),
        };

        match test_report {
            Some(report) if !report.is_passed() => Review {
                summary,
                comments: vec![ReviewComment {
                    file: None,
                    line: None,
                    comment: "Tests failing: ensure fixes pass tests".to_string(),
                    severity: Severity::Blocker,
                }],
                approve: false,
            },
            _ => Review {
                summary,
                comments: vec![ReviewComment {
                    file: Some("src/example.py".to_string()),
                    line: Some(10),
                    comment: "Consider using a guard clause for readability".to_string(),
                    severity: Severity::Suggestion,
                }],
                approve: test_report.is_some(),
            },
        }
    }
}

pub fn format_review_comment(review: &Review) -> String {
    let mut body = format!("Automated review summary: {}\n", review.summary);
    for comment in &review.comments {
        body.push('\n');
        body.push_str(&format!("- {}: {}", comment.severity, comment.comment));
        match (&comment.file, comment.line) {
            (Some(file), Some(line)) => body.push_str(&format!(" ({}:{})", file, line)),
            (Some(file), None) => body.push_str(&format!(" ({})", file)),
            _ => {}
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewbot_core::TestTarget;
    use insta::assert_snapshot;

    fn repo() -> RepoSlug {
        RepoSlug::new("acme", "widgets")
    }

    #[test]
    fn test_failing_report_blocks() {
        let report = TestReport::failed(TestTarget::PullRequest(7), "boom");
        let review = ReviewerAgent.review_pr(&repo(), Some(7), None, Some(&report));

        assert!(!review.approve);
        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].severity, Severity::Blocker);
    }

    #[test]
    fn test_passing_report_approves() {
        let report = TestReport::passed(TestTarget::PullRequest(7), "ok");
        let review = ReviewerAgent.review_pr(&repo(), Some(7), None, Some(&report));

        assert!(review.approve);
        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].severity, Severity::Suggestion);
    }

    #[test]
    fn test_missing_report_suggests_without_approving() {
        let review = ReviewerAgent.review_pr(&repo(), Some(7), Some("diff --git"), None);

        assert!(!review.approve);
        assert_eq!(review.comments[0].severity, Severity::Suggestion);
        assert_eq!(review.summary, "Automated review for PR #7.");
    }

    #[test]
    fn test_review_comment_rendering() {
        let report = TestReport::passed(TestTarget::PullRequest(7), "ok");
        let review = ReviewerAgent.review_pr(&repo(), Some(7), None, Some(&report));
        assert_snapshot!(format_review_comment(&review), @r"
Automated review summary: Automated review for PR #7.

- suggestion: Consider using a guard clause for readability (src/example.py:10)
");
    }

    #[test]
    fn test_blocker_rendering_has_no_location() {
        let report = TestReport::failed(TestTarget::PullRequest(3), "boom");
        let review = ReviewerAgent.review_pr(&repo(), Some(3), None, Some(&report));
        assert_snapshot!(format_review_comment(&review), @r"
Automated review summary: Automated review for PR #3.

- blocker: Tests failing: ensure fixes pass tests
");
    }
}
