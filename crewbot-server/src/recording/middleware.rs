use super::logger::new_event;
use super::sanitizer::Sanitizer;
use super::types::{CorrelationId, Direction, EventType, CORRELATION_ID_HEADER};
use super::RecordingLogger;
use axum::http::{self, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use std::collections::HashMap;
use uuid::Uuid;

const MAX_RECORDED_BODY: usize = 10_000;

/// Records every outbound GitHub call and its response status.
pub struct RecordingMiddleware {
    logger: RecordingLogger,
}

impl RecordingMiddleware {
    pub fn new(logger: RecordingLogger) -> Self {
        Self { logger }
    }
}

#[async_trait::async_trait]
impl Middleware for RecordingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| extensions.get::<CorrelationId>().map(|id| id.0.clone()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            if let Ok(value) = HeaderValue::from_str(&correlation_id) {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
        }

        let request_data = extract_request_data(&req);
        let operation = format!("{} {}", request_data.method, extract_path(&request_data.url));
        self.logger.record(new_event(
            &correlation_id,
            EventType::GitHubApiCall,
            Direction::Request,
            operation.clone(),
            serde_json::to_value(&request_data).unwrap_or(serde_json::Value::Null),
        ));

        let response = next.run(req, extensions).await;

        let event = match &response {
            Ok(resp) => new_event(
                &correlation_id,
                EventType::GitHubApiCall,
                Direction::Response,
                operation,
                serde_json::to_value(extract_response_data(resp))
                    .unwrap_or(serde_json::Value::Null),
            ),
            Err(err) => new_event(
                &correlation_id,
                EventType::GitHubApiCall,
                Direction::Response,
                operation,
                serde_json::json!({
                    "error": err.to_string(),
                    "error_type": format!("{:?}", err)
                }),
            ),
        };
        self.logger.record(event);

        response
    }
}

fn headers_to_map(headers: &http::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

fn extract_request_data(request: &Request) -> RequestData {
    let body = match request.body().map(|body| body.as_bytes()) {
        None => serde_json::Value::Null,
        Some(None) => serde_json::Value::String("[STREAM_BODY]".to_string()),
        Some(Some(bytes)) => describe_body(bytes),
    };

    RequestData {
        method: request.method().to_string(),
        url: request.url().to_string(),
        headers: Sanitizer::sanitize_headers(&headers_to_map(request.headers())),
        body,
    }
}

/// JSON bodies are kept (sanitized) unless they are large; anything else is summarized.
fn describe_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.len() > MAX_RECORDED_BODY {
        return serde_json::Value::String(format!("[LARGE_BODY_{}b]", bytes.len()));
    }
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(json) => Sanitizer::sanitize_json(&json),
        Err(_) => match std::str::from_utf8(bytes) {
            Ok(text) => serde_json::Value::String(text.to_string()),
            Err(_) => serde_json::Value::String(format!("[BINARY_BODY_{}b]", bytes.len())),
        },
    }
}

fn extract_response_data(response: &Response) -> ResponseData {
    ResponseData {
        status_code: response.status().as_u16(),
        headers: Sanitizer::sanitize_headers(&headers_to_map(response.headers())),
        body_size: response.content_length().unwrap_or(0),
    }
}

#[derive(Debug, serde::Serialize)]
struct RequestData {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    body: serde_json::Value,
}

#[derive(Debug, serde::Serialize)]
struct ResponseData {
    status_code: u16,
    headers: HashMap<String, String>,
    body_size: u64,
}

fn extract_path(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}
