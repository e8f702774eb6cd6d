use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One line of the JSONL recording log.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordedEvent {
    pub timestamp: String, // RFC 3339
    pub correlation_id: String,
    pub event_type: EventType,
    pub direction: Direction,
    pub operation: String, // e.g. "request_review", "POST /repos/acme/widgets/git/blobs"
    pub data: serde_json::Value,
    pub metadata: HashMap<String, String>, // repo, pr_number, task_id for orchestrator events
}

impl RecordedEvent {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    RequestAccepted,
    WebhookReceived,
    GitHubApiCall,
    TaskOutcome,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
    /// Produced inside the process, e.g. a finished agent task.
    Internal,
}

#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";
