//! Apache-style access lines written by the secondary service:
//!
//! ```text
//! IP - USER [30/Jun/2025:14:28:25 +0000] "GET /path HTTP/1.1" 200 512 "referer" "agent" 12.5 ms
//! ```
//!
//! The referer/agent pair and the trailing duration are optional.

use super::record::parse_timestamp;
use super::LineContext;
use crate::types::{Details, Event, RequestDetails, DEFAULT_LEVEL};
use std::collections::BTreeMap;

pub(super) fn parse(line: &str, ctx: &LineContext<'_>) -> Option<Event> {
    let caps = ctx.patterns.access.captures(line)?;
    let group = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty() && *s != "-")
    };

    let method = caps[4].to_string();
    let url = caps[5].to_string();
    let status_code: u16 = caps[6].parse().unwrap_or(0);

    let details = RequestDetails {
        endpoint: url.split('?').next().unwrap_or(&url).to_string(),
        status_code,
        duration_ms: group(10).and_then(|d| d.parse().ok()).unwrap_or(0.0),
        client_ip: group(1).map(str::to_string),
        // Anonymous and test clients log a name here; only numeric ids are users.
        user_id: group(2)
            .filter(|u| u.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string),
        request_id: None,
        user_agent: group(9).map(str::to_string),
        referer: group(8).map(str::to_string),
        response_size: group(7).and_then(|s| s.parse().ok()),
        url: Some(url.clone()),
        method: method.clone(),
    };

    Some(Event {
        source: ctx.source,
        level: DEFAULT_LEVEL.to_string(),
        timestamp: parse_timestamp(&caps[3]).unwrap_or(ctx.observed_at),
        message: format!("{method} {url} - {status_code}"),
        origin: ctx.origin.to_path_buf(),
        details: Details::Request(details),
        extra: BTreeMap::new(),
    })
}
