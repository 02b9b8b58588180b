//! Middleware for logging requests and responses.

use std::sync::OnceLock;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::Request,
    http::{StatusCode, request, response},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde_json::{Value, json};

/// The number of bytes of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The largest request or response body the middleware will buffer, axum's default body limit.
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// JSON fields whose values are never written to the log.
const REDACTED_FIELDS: [&str; 2] = ["password", "otp"];

const REDACTED_VALUE: &str = "********";

/// A secret field and its value in text that may not be valid JSON.
///
/// The value is a string, possibly unterminated, or anything up to the next `,` or `}`.
const SECRET_FIELD_PATTERN: &str = r#""(password|otp)"\s*:\s*(?:"(?:[^"\\]|\\.)*"?|[^,}]*)"#;

fn secret_field_regex() -> &'static Regex {
    static SECRET_FIELD_REGEX: OnceLock<Regex> = OnceLock::new();

    SECRET_FIELD_REGEX.get_or_init(|| {
        Regex::new(SECRET_FIELD_PATTERN).expect("secret field pattern is valid")
    })
}

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords and one-time codes in JSON request bodies are redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!("Could not read request body: {error}");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body is too large" })),
            )
                .into_response();
        }
    };

    log_request(&parts, &redact_secrets(&body_text(&body_bytes)));

    let response = next.run(Request::from_parts(parts, Body::from(body_bytes))).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return Response::from_parts(parts, Body::empty());
        }
    };

    log_response(&parts, &body_text(&body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

fn body_text(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Replace the values of secret fields in a JSON body.
///
/// Bodies that fail to parse as JSON are scrubbed field by field instead.
fn redact_secrets(body: &str) -> String {
    let Ok(mut json) = serde_json::from_str::<Value>(body) else {
        return secret_field_regex()
            .replace_all(body, format!(r#""$1":"{REDACTED_VALUE}""#).as_str())
            .into_owned();
    };

    if !redact_value(&mut json) {
        return body.to_owned();
    }

    json.to_string()
}

/// Returns whether any field was redacted.
fn redact_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut redacted = false;

            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String(REDACTED_VALUE.to_owned());
                    redacted = true;
                } else {
                    redacted |= redact_value(field);
                }
            }

            redacted
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |redacted, item| redact_value(item) || redacted),
        _ => false,
    }
}

/// The longest prefix of `text` that is at most `limit` bytes and ends on a char boundary.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

fn log_request(parts: &request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {parts:#?}\nbody: {}...",
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {parts:#?}\nbody: {body:?}");
    }
}

fn log_response(parts: &response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {parts:#?}\nbody: {}...",
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {parts:#?}\nbody: {body:?}");
    }
}
