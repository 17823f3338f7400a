//! JSON records from either service.

use super::record::{parse_duration_ms, parse_status, parse_timestamp, Record};
use super::{classify_error, LineContext};
use crate::types::{
    is_alert_level, CodeLocation, Details, ErrorDetails, Event, ExceptionInfo, InfoDetails,
    RequestDetails, DEFAULT_LEVEL,
};
use serde_json::Value;

const LEVEL_KEYS: &[&str] = &["level", "severity", "levelname"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "@timestamp", "ts"];
const MESSAGE_KEYS: &[&str] = &["message", "msg"];
const CLIENT_IP_KEYS: &[&str] = &["ip", "client_ip", "remote_addr"];
const USER_ID_KEYS: &[&str] = &["user_id", "userId"];
const REQUEST_ID_KEYS: &[&str] = &["req_id", "request_id", "requestId"];
const DURATION_KEYS: &[&str] = &["response_time", "duration_ms", "duration"];
const STATUS_KEYS: &[&str] = &["status_code", "status"];

pub(super) fn normalize(mut rec: Record, ctx: &LineContext<'_>) -> Event {
    let level = rec
        .take_string(LEVEL_KEYS)
        .map(|level| level.to_lowercase())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    let timestamp = rec
        .take_string(TIMESTAMP_KEYS)
        .and_then(|raw| parse_timestamp(&raw))
        .unwrap_or(ctx.observed_at);

    let (message, details) = if ctx.request_file || is_request_shaped(&rec) {
        request(&mut rec)
    } else {
        let message = take_message(&mut rec);
        let details = if is_alert_level(&level) {
            Details::Error(error_details(&mut rec, &message, ctx))
        } else {
            Details::Info(info_details(&mut rec, &message, ctx))
        };
        (message, details)
    };

    Event {
        source: ctx.source,
        level,
        timestamp,
        message,
        origin: ctx.origin.to_path_buf(),
        details,
        extra: rec.into_extra(),
    }
}

/// Request records carry an endpoint, or a method alongside a status or
/// path. The primary service nests them inside a `message` object.
fn is_request_shaped(rec: &Record) -> bool {
    if let Some(Value::Object(nested)) = rec.get("message") {
        return nested.contains_key("endpoint") || nested.contains_key("method");
    }
    rec.contains("endpoint")
        || (rec.contains("method") && STATUS_KEYS.iter().chain(&["path", "url"]).any(|k| rec.contains(k)))
}

fn take_message(rec: &mut Record) -> String {
    match rec.take(MESSAGE_KEYS) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn request(rec: &mut Record) -> (String, Details) {
    let mut nested = rec.take_object("message");
    let text = rec.take_string(MESSAGE_KEYS);

    let details = {
        let src = match nested.as_mut() {
            Some(nested) => nested,
            None => &mut *rec,
        };
        RequestDetails {
            method: src
                .take_string(&["method"])
                .map(|m| m.to_uppercase())
                .unwrap_or_else(|| "-".to_string()),
            endpoint: src
                .take_string(&["endpoint", "path", "route"])
                .unwrap_or_else(|| "-".to_string()),
            status_code: parse_status(src.take(STATUS_KEYS).as_ref()),
            duration_ms: parse_duration_ms(src.take(DURATION_KEYS).as_ref()),
            client_ip: src.take_string(CLIENT_IP_KEYS),
            user_id: src.take_string(USER_ID_KEYS),
            request_id: src.take_string(REQUEST_ID_KEYS),
            user_agent: src
                .take_string(&["user_agent", "userAgent"])
                .map(|ua| ua.trim_matches('"').to_string())
                .filter(|ua| !ua.is_empty()),
            url: src.take_string(&["url"]),
            referer: src.take_string(&["referer", "referrer"]),
            response_size: src.take(&["response_size", "bytes"]).and_then(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
        }
    };
    if let Some(nested) = nested {
        rec.absorb(nested);
    }

    let message = text.unwrap_or_else(|| {
        format!("{} {} {}", details.method, details.endpoint, details.status_code)
    });
    (message, Details::Request(details))
}

fn error_details(rec: &mut Record, message: &str, ctx: &LineContext<'_>) -> ErrorDetails {
    ErrorDetails {
        client_ip: rec.take_string(CLIENT_IP_KEYS),
        user_id: rec.take_string(USER_ID_KEYS).or_else(|| ctx.user_id_in(message)),
        request_id: rec.take_string(REQUEST_ID_KEYS),
        code: code_location(rec),
        exception: rec.take_object("exception").map(|mut exc| ExceptionInfo {
            kind: exc
                .take_string(&["type"])
                .unwrap_or_else(|| "Exception".to_string()),
            message: exc.take_string(&["message"]).unwrap_or_default(),
            traceback: exc.take_string(&["traceback"]),
        }),
        error_kind: classify_error(message),
    }
}

fn info_details(rec: &mut Record, message: &str, ctx: &LineContext<'_>) -> InfoDetails {
    InfoDetails {
        client_ip: rec.take_string(CLIENT_IP_KEYS),
        user_id: rec.take_string(USER_ID_KEYS).or_else(|| ctx.user_id_in(message)),
        request_id: rec.take_string(REQUEST_ID_KEYS),
        code: code_location(rec),
        status_code: rec.take(STATUS_KEYS).map(|v| parse_status(Some(&v))),
        duration_ms: rec.take(DURATION_KEYS).map(|v| parse_duration_ms(Some(&v))),
    }
}

fn code_location(rec: &mut Record) -> CodeLocation {
    CodeLocation {
        logger: rec.take_string(&["name", "logger"]),
        function: rec.take_string(&["function", "funcName"]),
        filename: rec.take_string(&["filename"]),
        path: rec.take_string(&["path", "pathname"]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
