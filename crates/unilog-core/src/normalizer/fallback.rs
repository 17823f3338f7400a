//! Generic fallback for text lines that match no known format: the whole
//! line becomes the message, with a best-effort timestamp and severity
//! scanned out of it.

use super::record::parse_timestamp;
use super::{classify_error, LineContext};
use crate::types::{is_alert_level, Details, ErrorDetails, Event, InfoDetails, DEFAULT_LEVEL};
use std::collections::BTreeMap;

pub(super) fn normalize(line: &str, ctx: &LineContext<'_>) -> Event {
    let level = ctx
        .patterns
        .level
        .captures(line)
        .map(|caps| caps[1].to_lowercase())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    let timestamp = ctx
        .patterns
        .timestamp
        .find(line)
        .and_then(|m| parse_timestamp(m.as_str()))
        .unwrap_or(ctx.observed_at);
    let user_id = ctx.user_id_in(line);

    let details = if is_alert_level(&level) {
        Details::Error(ErrorDetails {
            user_id,
            error_kind: classify_error(line),
            ..ErrorDetails::default()
        })
    } else {
        Details::Info(InfoDetails {
            user_id,
            ..InfoDetails::default()
        })
    };

    Event {
        source: ctx.source,
        level,
        timestamp,
        message: line.to_string(),
        origin: ctx.origin.to_path_buf(),
        details,
        extra: BTreeMap::new(),
    }
}
