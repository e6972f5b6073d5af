//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::Error;

/// Logged bodies longer than this many characters are truncated in the `info` log.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The most bytes of a JSON or text body that will be buffered for logging.
const BUFFERED_BODY_LIMIT: usize = 2 * 1024 * 1024;

const REDACTED_FIELDS: [&str; 2] = ["password", "confirmPassword"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords in JSON request bodies are redacted. Multipart forms and other
/// binary bodies, such as uploaded files and reports, are passed through
/// untouched and only their size is logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let request = if is_text(&parts.headers) {
        let body = match axum::body::to_bytes(body, BUFFERED_BODY_LIMIT).await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!("Could not read request body: {error}");
                return Error::InvalidBody("Failed to read the request body".to_owned())
                    .into_response();
            }
        };
        log_request(&parts, &redact_passwords(&body));
        Request::from_parts(parts, Body::from(body))
    } else {
        log_request(&parts, &describe_binary_body(&parts.headers));
        Request::from_parts(parts, body)
    };

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    if !is_text(&parts.headers) {
        log_response(&parts, &describe_binary_body(&parts.headers));
        return Response::from_parts(parts, body);
    }

    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => {
            log_response(&parts, &String::from_utf8_lossy(&body));
            Response::from_parts(parts, Body::from(body))
        }
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            Error::Io(error.to_string()).into_response()
        }
    }
}

/// Whether the body is JSON or text, or is empty and has no content type.
fn is_text(headers: &HeaderMap) -> bool {
    match headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()) {
        Some(content_type) => {
            content_type.starts_with("application/json") || content_type.starts_with("text/")
        }
        None => true,
    }
}

fn describe_binary_body(headers: &HeaderMap) -> String {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let content_type = content_type.split(';').next().unwrap_or_default();

    match headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
    {
        Some(length) => format!("<{content_type}, {length} bytes>"),
        None => format!("<{content_type}>"),
    }
}

/// Replace the value of every password field in a JSON object.
fn redact_passwords(body: &Bytes) -> String {
    let Ok(Value::Object(mut object)) = serde_json::from_slice::<Value>(body) else {
        return String::from_utf8_lossy(body).into_owned();
    };

    for field in REDACTED_FIELDS {
        if let Some(value) = object.get_mut(field) {
            *value = Value::String("********".to_owned());
        }
    }

    Value::Object(object).to_string()
}

fn truncate(body: &str) -> Option<&str> {
    body.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &body[..end])
}

fn log_request(parts: &axum::http::request::Parts, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!(
                "Received request: {} {}\nbody: {truncated}...",
                parts.method,
                parts.uri
            );
            tracing::debug!("Full request body: {body:?}");
        }
        None => tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        ),
    }
}

fn log_response(parts: &axum::http::response::Parts, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!("Sending response: {}\nbody: {truncated}...", parts.status);
            tracing::debug!("Full response body: {body:?}");
        }
        None => tracing::info!("Sending response: {}\nbody: {body:?}", parts.status),
    }
}
