pub mod agents;
pub mod api;
pub mod config;
pub mod github;
pub mod host;
pub mod orchestrator;
pub mod recording;
pub mod webhook;

pub use crewbot_core::{
    CorrelationId, Direction, EventType, RecordedEvent, Sanitizer, CORRELATION_ID_HEADER,
};
pub use github::GitHubClient;
pub use host::RepositoryHost;
pub use orchestrator::{Orchestrator, ReportLookup, SubmitResponse, TaskOutcome};
pub use recording::RecordingLogger;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn get_bot_version() -> String {
    let hash = option_env!("CREWBOT_GIT_HASH").or(built_info::GIT_COMMIT_HASH);
    match hash {
        Some(git_hash) if git_hash.len() >= 8 => git_hash[..8].to_string(),
        Some(git_hash) => git_hash.to_string(),
        None => "unknown".to_string(),
    }
}

pub struct AppState {
    pub orchestrator: Orchestrator,
    /// When set, webhook deliveries must carry a valid `X-Hub-Signature-256`.
    pub webhook_secret: Option<String>,
    pub recording_logger: Option<RecordingLogger>,
}
