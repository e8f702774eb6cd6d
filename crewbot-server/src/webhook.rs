use axum::{
    body::Bytes,
    extract::{Extension, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::recording::new_event;
use crate::AppState;
use crate::{CorrelationId, Direction, EventType, Sanitizer};

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Larger deliveries are rejected with 413 before signature checking.
pub const MAX_WEBHOOK_BODY_SIZE: usize = 1024 * 1024;

/// The parts of a `pull_request` delivery the orchestrator acts on.
#[derive(Debug, Deserialize)]
pub struct PullRequestEventPayload {
    pub action: Option<String>,
    pub pull_request: Option<PullRequest>,
    pub repository: Option<Repository>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequest {
    pub number: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Repository {
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookResponse {
    pub ok: bool,
}

type HmacSha256 = Hmac<Sha256>;

pub fn verify_github_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(signature_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&signature_bytes).is_ok()
}

/// Tags the delivery with a correlation ID, records it, and enforces the
/// signature when a webhook secret is configured.
async fn verify_webhook_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let correlation_id = CorrelationId(Uuid::new_v4().to_string());

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_SIZE)
        .await
        .map_err(|_| {
            error!("Webhook body too large or read error");
            StatusCode::PAYLOAD_TOO_LARGE
        })?;

    if let Some(secret) = &state.webhook_secret {
        let signature = parts
            .headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                warn!("Webhook delivery without signature rejected");
                StatusCode::UNAUTHORIZED
            })?;

        if !verify_github_signature(secret, &bytes, signature) {
            error!("Invalid webhook signature");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    if let Some(ref logger) = state.recording_logger {
        let headers_map = headers_to_hashmap(&parts.headers);
        logger.record(new_event(
            &correlation_id.0,
            EventType::WebhookReceived,
            Direction::Request,
            "webhook",
            serde_json::json!({
                "headers": Sanitizer::sanitize_headers(&headers_map),
                "body": serde_json::from_slice::<serde_json::Value>(&bytes)
                    .map(|body| Sanitizer::sanitize_json(&body))
                    .unwrap_or(serde_json::Value::Null)
            }),
        ));
    }

    let mut new_request = Request::from_parts(parts, axum::body::Body::from(bytes));
    new_request.extensions_mut().insert(correlation_id);

    Ok(next.run(new_request).await)
}

fn headers_to_hashmap(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value_str) = value.to_str() {
            map.insert(name.to_string(), value_str.to_string());
        }
    }
    map
}

/// Always acknowledges; whether anything was scheduled only shows up in the log.
pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    correlation_id: Option<Extension<CorrelationId>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Json<WebhookResponse> {
    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown");
    let correlation_id = correlation_id
        .map(|Extension(id)| id.0)
        .unwrap_or_default();

    info!("Received {} webhook ({})", event_type, correlation_id);

    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(payload) => {
            let scheduled = state
                .orchestrator
                .handle_webhook_event(event_type, &payload);
            info!(
                "Webhook {} ({}) scheduled work: {}",
                event_type, correlation_id, scheduled
            );
        }
        Err(e) => {
            warn!("Unparseable {} webhook body: {}", event_type, e);
        }
    }

    Json(WebhookResponse { ok: true })
}

pub fn webhook_router(middleware_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook/github", post(github_webhook_handler))
        .route_layer(middleware::from_fn_with_state(
            middleware_state,
            verify_webhook_signature,
        ))
}
