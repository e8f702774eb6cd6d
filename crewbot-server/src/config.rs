use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

use crate::orchestrator::ReportLookup;
use crewbot_core::RepoSlug;

#[derive(Clone, Debug)]
pub struct Config {
    pub github_token: String,
    /// Fallback repository for webhook deliveries that do not name one.
    pub github_repo: RepoSlug,
    pub github_api_url: String,
    pub github_webhook_secret: Option<String>,
    pub host: String,
    pub port: u16,
    pub base_branch: String,
    /// Only logged at start-up; artifacts stay in process memory.
    pub vector_db_url: Option<String>,
    /// When set, tests run on this CI runner instead of the simulated runner.
    pub ci_runner_url: Option<String>,
    pub test_delay: Duration,
    pub http_timeout: Duration,
    pub report_lookup: ReportLookup,
    pub recording_enabled: bool,
    pub recording_log_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = non_empty(env::var("GITHUB_TOKEN").ok())
            .context("GITHUB_TOKEN environment variable is required")?;

        let github_repo = env::var("GITHUB_REPO")
            .context("GITHUB_REPO environment variable is required")?
            .parse::<RepoSlug>()
            .context("GITHUB_REPO must have the form owner/name")?;

        let github_api_url = env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| crate::github::DEFAULT_API_URL.to_string());

        let github_webhook_secret = non_empty(env::var("GITHUB_WEBHOOK_SECRET").ok());

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let base_branch =
            non_empty(env::var("BASE_BRANCH").ok()).unwrap_or_else(|| "main".to_string());

        let vector_db_url = non_empty(env::var("VECTOR_DB_URL").ok());
        let ci_runner_url = non_empty(env::var("CI_RUNNER_URL").ok());

        let test_delay = parse_millis(env::var("TEST_DELAY_MS").ok(), 500)
            .context("TEST_DELAY_MS must be a number of milliseconds")?;

        let http_timeout = parse_secs(env::var("HTTP_TIMEOUT_SECS").ok(), 30)
            .context("HTTP_TIMEOUT_SECS must be a positive number of seconds")?;

        let report_lookup = match env::var("ARTIFACT_LOOKUP") {
            Ok(value) => value.parse::<ReportLookup>().map_err(|e| anyhow!(e))?,
            Err(_) => ReportLookup::default(),
        };

        let recording_enabled = parse_flag(env::var("RECORDING_ENABLED").ok());

        let recording_log_path =
            env::var("RECORDING_LOG_PATH").unwrap_or_else(|_| "recordings.jsonl".to_string());

        Ok(Config {
            github_token,
            github_repo,
            github_api_url,
            github_webhook_secret,
            host,
            port,
            base_branch,
            vector_db_url,
            ci_runner_url,
            test_delay,
            http_timeout,
            report_lookup,
            recording_enabled,
            recording_log_path,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Treat missing, empty and whitespace-only values alike.
///
/// An empty webhook secret must not silently turn signature checks into
/// "any signature over the empty key".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

pub fn parse_millis(value: Option<String>, default: u64) -> Result<Duration> {
    match non_empty(value) {
        Some(v) => Ok(Duration::from_millis(v.trim().parse::<u64>()?)),
        None => Ok(Duration::from_millis(default)),
    }
}

pub fn parse_secs(value: Option<String>, default: u64) -> Result<Duration> {
    let secs = match non_empty(value) {
        Some(v) => v.trim().parse::<u64>()?,
        None => default,
    };
    if secs == 0 {
        return Err(anyhow!("timeout must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// `true`, `1` and `yes` (any case) enable a flag; everything else leaves it off.
pub fn parse_flag(value: Option<String>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1") | Some("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_filters_blank_values() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("".to_string())), None);
        assert_eq!(non_empty(Some(" \t\n".to_string())), None);
        assert_eq!(
            non_empty(Some("  token  ".to_string())),
            Some("  token  ".to_string())
        );
    }

    #[test]
    fn test_parse_millis_default_and_override() {
        assert_eq!(parse_millis(None, 500).unwrap(), Duration::from_millis(500));
        assert_eq!(
            parse_millis(Some("25".to_string()), 500).unwrap(),
            Duration::from_millis(25)
        );
        assert!(parse_millis(Some("soon".to_string()), 500).is_err());
    }

    #[test]
    fn test_parse_secs_rejects_zero() {
        assert_eq!(parse_secs(None, 30).unwrap(), Duration::from_secs(30));
        assert!(parse_secs(Some("0".to_string()), 30).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("TRUE".to_string())));
        assert!(parse_flag(Some("1".to_string())));
        assert!(!parse_flag(Some("false".to_string())));
        assert!(!parse_flag(None));
    }
}
