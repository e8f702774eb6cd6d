use serde_json::Value;
use std::collections::HashMap;

/// Headers whose values must never reach a recording.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-hub-signature",
    "x-hub-signature-256",
];

/// JSON keys redacted from recorded payloads. `requester` is usually an email address.
pub const SENSITIVE_KEYS: &[&str] = &["token", "github_token", "secret", "password", "requester"];

const REDACTED: &str = "[REDACTED]";

pub struct Sanitizer;

impl Sanitizer {
    pub fn is_sensitive_header(header_name: &str) -> bool {
        let lower = header_name.to_lowercase();
        SENSITIVE_HEADERS.contains(&lower.as_str())
    }

    pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(key, value)| {
                let value = if Self::is_sensitive_header(key) {
                    REDACTED.to_string()
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    pub fn sanitize_json(value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, val)| {
                        let sanitized = if SENSITIVE_KEYS.contains(&key.as_str()) && !val.is_null()
                        {
                            Value::String(REDACTED.to_string())
                        } else {
                            Self::sanitize_json(val)
                        };
                        (key.clone(), sanitized)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(Self::sanitize_json).collect()),
            _ => value.clone(),
        }
    }
}
