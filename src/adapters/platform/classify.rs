//! Error classification at the platform boundary.
//!
//! Every failed HTTP exchange with the platform passes through exactly one
//! of these two functions. Downstream code only ever sees the resulting
//! [`PlatformError`] kind and wait hint.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use crate::ports::PlatformError;

/// Platform error codes that mean "you are not allowed to do this".
const MISSING_ACCESS: u64 = 50001;
const MISSING_PERMISSIONS: u64 = 50013;

/// Longest wait hint taken from a response; larger values are clamped.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
    /// Seconds, possibly fractional.
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: Option<bool>,
}

/// Classify a non-success HTTP response.
pub fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str) -> PlatformError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = match (&parsed.message, parsed.code) {
        (Some(msg), Some(code)) => format!("{} {} (code {})", status.as_u16(), msg, code),
        (Some(msg), None) => format!("{} {}", status.as_u16(), msg),
        _ => format!("{} {}", status.as_u16(), truncate(body, 200)),
    };

    if status == StatusCode::FORBIDDEN
        || matches!(parsed.code, Some(MISSING_ACCESS) | Some(MISSING_PERMISSIONS))
    {
        return PlatformError::permission_denied(message);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let hint = parsed
            .retry_after
            .and_then(seconds_to_duration)
            .or_else(|| header_seconds(headers, "retry-after"))
            .or_else(|| header_seconds(headers, "x-ratelimit-reset-after"));
        let scope = if parsed.global == Some(true) { "global " } else { "" };
        return PlatformError::rate_limited(hint, format!("{}rate limit: {}", scope, message));
    }

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return PlatformError::transient(message);
    }

    PlatformError::other(message)
}

/// Classify a failure that happened before a response arrived.
pub fn classify_transport(error: &reqwest::Error) -> PlatformError {
    if error.is_timeout() {
        PlatformError::transient(format!("request timed out: {}", error))
    } else if error.is_connect() || error.is_request() {
        PlatformError::transient(format!("connection failed: {}", error))
    } else if error.is_decode() || error.is_body() {
        PlatformError::transient(format!("malformed response: {}", error))
    } else {
        PlatformError::other(error.to_string())
    }
}

fn header_seconds(headers: &HeaderMap, name: &str) -> Option<Duration> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(seconds_to_duration)
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let hint = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
    Some(hint.min(MAX_RETRY_AFTER))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
