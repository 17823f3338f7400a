//! Normalizer — turns one [`RawLine`] into a canonical [`Event`].
//!
//! Parsing is attempted in order: JSON object → Apache access line →
//! generic text fallback. The normalizer is stateless apart from its
//! configuration (watched roots, request-file markers, compiled patterns),
//! so one instance can be shared freely between threads.
//!
//! # Classification
//!
//! | Record shape                                                | Category  |
//! |-------------------------------------------------------------|-----------|
//! | file path contains a request marker, request-shaped fields, or an Apache access line | `request` |
//! | level is `error`, `warn` or `warning`                       | `error`   |
//! | anything else                                               | `info`    |
//!
//! # Field reconciliation
//!
//! The two services name the same concept differently (`ip` / `client_ip`,
//! `req_id` / `request_id`, `response_time: "12ms"` / `duration_ms: 12`).
//! The builders in `structured` read every alias so downstream consumers see
//! one schema regardless of origin.

mod access;
mod fallback;
mod record;
mod structured;

use crate::config::{SourcesConfig, WatchRoot};
use crate::types::{Event, RawLine, Source};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::Path;

/// Error classifications keyed by a lowercase message keyword.
const ERROR_KINDS: &[(&str, &str)] = &[
    ("rate_limit", "rate_limit"),
    ("rate limit", "rate_limit"),
    ("database", "db_error"),
    ("network", "network_error"),
    ("authentication", "auth_error"),
    ("streaming", "streaming_error"),
];

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

pub struct Normalizer {
    roots: Vec<WatchRoot>,
    request_markers: Vec<String>,
    patterns: Patterns,
}

impl Normalizer {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self::with_roots(sources.roots(), sources.request_markers.clone())
    }

    pub fn with_roots(roots: Vec<WatchRoot>, request_markers: Vec<String>) -> Self {
        Self {
            roots,
            request_markers,
            patterns: Patterns::compile(),
        }
    }

    /// Normalise one line. Returns `None` for lines outside every watched
    /// root and for structured records that fail to decode.
    pub fn normalize(&self, line: &RawLine) -> Option<Event> {
        let Some(source) = self.source_of(&line.source_file) else {
            tracing::debug!(path = %line.source_file.display(), "line is outside every watched root");
            return None;
        };
        let content = line.content.trim();
        if content.is_empty() {
            return None;
        }

        let ctx = LineContext {
            source,
            origin: &line.source_file,
            observed_at: line.observed_at,
            request_file: self.is_request_file(&line.source_file),
            patterns: &self.patterns,
        };

        if content.starts_with('{') {
            return match serde_json::from_str::<serde_json::Value>(content) {
                Ok(serde_json::Value::Object(map)) => {
                    Some(structured::normalize(record::Record::new(map), &ctx))
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(
                        path = %line.source_file.display(),
                        error = %e,
                        "dropping malformed structured record"
                    );
                    None
                }
            };
        }

        Some(access::parse(content, &ctx).unwrap_or_else(|| fallback::normalize(content, &ctx)))
    }

    /// Which service a file belongs to: the root it lives under, or failing
    /// that, a root whose directory name appears in the path.
    pub fn source_of(&self, path: &Path) -> Option<Source> {
        self.roots
            .iter()
            .find(|root| path.starts_with(&root.path))
            .or_else(|| {
                self.roots.iter().find(|root| {
                    root.path.file_name().is_some_and(|name| {
                        path.parent()
                            .is_some_and(|dir| dir.components().any(|c| c.as_os_str() == name))
                    })
                })
            })
            .map(|root| root.source)
    }

    fn is_request_file(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.request_markers.iter().any(|marker| path.contains(marker.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Shared parsing context
// ---------------------------------------------------------------------------

pub(crate) struct Patterns {
    user_id: Regex,
    access: Regex,
    timestamp: Regex,
    level: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            user_id: Regex::new(r"(?:user_id|userId)[=:]\s*(\d+)").expect("static pattern"),
            access: Regex::new(
                r#"^(\S+) \S+ (\S+) \[([^\]]+)\] "([A-Z]+) (\S+)(?: HTTP/[^"]*)?" (\d{3}) (\d+|-)(?: "([^"]*)" "([^"]*)")?(?: ([\d.]+) ?ms)?\s*$"#,
            )
            .expect("static pattern"),
            timestamp: Regex::new(r"\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:\.\d+|,\d{3})?")
                .expect("static pattern"),
            level: Regex::new(r"(?i)\b(DEBUG|INFO|WARN|WARNING|ERROR|FATAL|TRACE)\b")
                .expect("static pattern"),
        }
    }
}

pub(crate) struct LineContext<'a> {
    source: Source,
    origin: &'a Path,
    observed_at: DateTime<Utc>,
    request_file: bool,
    patterns: &'a Patterns,
}

impl LineContext<'_> {
    fn user_id_in(&self, text: &str) -> Option<String> {
        self.patterns
            .user_id
            .captures(text)
            .map(|caps| caps[1].to_string())
    }
}

fn classify_error(message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    if lower.contains("validation error") {
        return Some("validation_error".to_string());
    }
    ERROR_KINDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, kind)| kind.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
