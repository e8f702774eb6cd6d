use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What the caller wants done.
///
/// Unknown or missing types fall back to [`RequestType::Other`], which the planner
/// turns into a generic review rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    ReviewPr,
    AutoFix,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestType::ReviewPr => write!(f, "review_pr"),
            RequestType::AutoFix => write!(f, "auto_fix"),
            RequestType::Other => write!(f, "other"),
        }
    }
}

/// Strict parse for command-line use; unlike deserialization, unknown names are
/// an error instead of [`RequestType::Other`].
impl FromStr for RequestType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "review_pr" => Ok(RequestType::ReviewPr),
            "auto_fix" => Ok(RequestType::AutoFix),
            "other" => Ok(RequestType::Other),
            _ => Err(UnknownVariant {
                kind: "request type",
                value: s.to_string(),
                expected: "review_pr, auto_fix, other",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            _ => Err(UnknownVariant {
                kind: "priority",
                value: s.to_string(),
                expected: "low, normal, high",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoSlugError {
    #[error("repository '{0}' must have the form owner/name")]
    Malformed(String),
}

/// A repository in `owner/name` form.
///
/// Parsing happens at the inbound boundary so the remote client never has to
/// split strings itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = RepoSlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(owner, name))
            }
            _ => Err(RepoSlugError::Malformed(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepoSlug {
    type Error = RepoSlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoSlug> for String {
    fn from(slug: RepoSlug) -> Self {
        slug.full_name()
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// An accepted review or auto-fix request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type", default)]
    pub request_type: RequestType,
    pub repo: RepoSlug,
    #[serde(default)]
    pub pr_number: Option<u64>,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub instructions: String,
}

impl Request {
    pub fn new(request_type: RequestType, repo: RepoSlug) -> Self {
        Self {
            request_type,
            repo,
            pr_number: None,
            requester: None,
            priority: Priority::default(),
            instructions: String::new(),
        }
    }

    pub fn with_pr_number(mut self, pr_number: u64) -> Self {
        self.pr_number = Some(pr_number);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repo_slug_parses_owner_and_name() {
        let slug: RepoSlug = "acme/widgets".parse().unwrap();
        assert_eq!(slug.owner, "acme");
        assert_eq!(slug.name, "widgets");
        assert_eq!(slug.to_string(), "acme/widgets");
    }

    #[test]
    fn test_repo_slug_rejects_wrong_separator_count() {
        assert!("acme".parse::<RepoSlug>().is_err());
        assert!("acme/widgets/extra".parse::<RepoSlug>().is_err());
        assert!("/widgets".parse::<RepoSlug>().is_err());
        assert!("acme/".parse::<RepoSlug>().is_err());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: Request = serde_json::from_value(json!({
            "type": "review_pr",
            "repo": "acme/widgets",
            "pr_number": 7
        }))
        .unwrap();

        assert_eq!(request.request_type, RequestType::ReviewPr);
        assert_eq!(request.repo, RepoSlug::new("acme", "widgets"));
        assert_eq!(request.pr_number, Some(7));
        assert_eq!(request.priority, Priority::Normal);
        assert_eq!(request.instructions, "");
        assert!(request.requester.is_none());
    }

    #[test]
    fn test_unknown_request_type_becomes_other() {
        let request: Request = serde_json::from_value(json!({
            "type": "refactor_everything",
            "repo": "acme/widgets"
        }))
        .unwrap();
        assert_eq!(request.request_type, RequestType::Other);

        let missing: Request = serde_json::from_value(json!({ "repo": "acme/widgets" })).unwrap();
        assert_eq!(missing.request_type, RequestType::Other);
    }

    #[test]
    fn test_malformed_repo_is_rejected() {
        let result: Result<Request, _> = serde_json::from_value(json!({
            "type": "review_pr",
            "repo": "not-a-repo"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_strict_parse_of_type_and_priority() {
        assert_eq!("auto_fix".parse::<RequestType>(), Ok(RequestType::AutoFix));
        assert_eq!(RequestType::ReviewPr.to_string(), "review_pr");
        assert_eq!("high".parse::<Priority>(), Ok(Priority::High));

        let err = "triage".parse::<RequestType>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown request type 'triage', expected one of: review_pr, auto_fix, other"
        );
        assert!("urgent".parse::<Priority>().is_err());
    }
}
