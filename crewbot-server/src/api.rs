use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::orchestrator::SubmitResponse;
use crate::webhook::webhook_router;
use crate::AppState;
use crewbot_core::Request;

/// Accepts a review or auto-fix request and answers as soon as it is planned.
///
/// A malformed body, including a `repo` that is not `owner/name`, is rejected
/// by the `Json` extractor before anything is scheduled.
pub async fn request_review_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<Request>,
) -> Json<SubmitResponse> {
    info!(
        "Review request for {} (PR {:?}) from {}",
        request.repo,
        request.pr_number,
        request.requester.as_deref().unwrap_or("anonymous")
    );

    Json(state.orchestrator.submit(request))
}

pub async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "crewbot"
    })))
}

pub async fn help_handler() -> Json<serde_json::Value> {
    let version = crate::get_bot_version();
    Json(json!({
        "service": "crewbot",
        "version": version,
        "description": "Plans review and auto-fix requests and runs tester, reviewer and coder agents against GitHub",
        "endpoints": [
            {
                "path": "/v1/request-review",
                "method": "POST",
                "description": "Submit a review_pr or auto_fix request; answers with the queued plan",
                "authentication": "None",
                "response_format": "application/json"
            },
            {
                "path": "/webhook/github",
                "method": "POST",
                "description": "GitHub webhook receiver; pull_request opened/synchronize/reopened schedules a test run and a review",
                "authentication": "GitHub webhook signature (X-Hub-Signature-256) when GITHUB_WEBHOOK_SECRET is set",
                "response_format": "application/json"
            },
            {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint",
                "authentication": "None",
                "response_format": "application/json"
            },
            {
                "path": "/help",
                "method": "GET",
                "description": "API documentation and service information",
                "authentication": "None",
                "response_format": "application/json"
            }
        ],
        "configuration": {
            "required_env_vars": ["GITHUB_TOKEN", "GITHUB_REPO"],
            "optional_env_vars": [
                "HOST (default: 0.0.0.0)",
                "PORT (default: 8000)",
                "GITHUB_API_URL (default: https://api.github.com)",
                "GITHUB_WEBHOOK_SECRET",
                "BASE_BRANCH (default: main)",
                "CI_RUNNER_URL",
                "TEST_DELAY_MS (default: 500)",
                "HTTP_TIMEOUT_SECS (default: 30)",
                "ARTIFACT_LOOKUP (any or keyed, default: any)",
                "VECTOR_DB_URL",
                "RECORDING_ENABLED (default: false)",
                "RECORDING_LOG_PATH (default: recordings.jsonl)"
            ]
        }
    }))
}

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/request-review", post(request_review_handler))
}

/// Every route the server exposes, with request tracing.
pub fn app_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/help", get(help_handler))
        .merge(api_router())
        .merge(webhook_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}
