//! Core types for unilog-core.
//!
//! This module defines the data shared across all pipeline layers: the
//! ephemeral [`RawLine`] handed from the watcher to the dispatcher, the
//! canonical [`Event`] produced by the normalizer, its [`Source`] and
//! [`Category`] discriminants, and the ISO [`Week`] key used to partition
//! persisted events.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// RawLine
// ---------------------------------------------------------------------------

/// One non-empty, stripped line read from a watched file. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    /// File the line was read from.
    pub source_file: PathBuf,
    /// Line content with surrounding whitespace removed.
    pub content: String,
    /// When the watcher read the line.
    pub observed_at: DateTime<Utc>,
}

impl RawLine {
    pub fn new(source_file: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            content: content.into(),
            observed_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source / Category
// ---------------------------------------------------------------------------

/// Which emitting service produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Service writing line-delimited JSON.
    Primary,
    /// Service writing a mix of JSON and Apache-style access lines.
    Secondary,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Primary, Source::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Primary => "primary",
            Source::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unified bucket an event is classified into regardless of origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Info,
    Error,
    Request,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Info, Category::Error, Category::Request];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Info => "info",
            Category::Error => "error",
            Category::Request => "request",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Category::Info),
            "error" => Ok(Category::Error),
            "request" => Ok(Category::Request),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Category selector for store queries: one bucket, or every bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    All,
    Only(Category),
}

impl CategoryFilter {
    /// Name used in partition file names (`all`, `info`, `error`, `request`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Only(category) => category.as_str(),
        }
    }
}

impl From<Category> for CategoryFilter {
    fn from(category: Category) -> Self {
        CategoryFilter::Only(category)
    }
}

impl FromStr for CategoryFilter {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        s.parse().map(CategoryFilter::Only)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Severity used when a record carries none.
pub const DEFAULT_LEVEL: &str = "info";

/// Whether a lowercase level routes to the `error` category and the alert channel.
pub fn is_alert_level(level: &str) -> bool {
    matches!(level, "error" | "warn" | "warning")
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A normalised log record. Immutable once the normalizer has built it.
///
/// The envelope (`source`, `level`, `timestamp`, `message`, `origin`) is
/// common to every event; category-specific attributes live in
/// [`Details`], which also determines the event's [`Category`]. Keys the
/// normalizer does not recognise are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub source: Source,
    /// Lowercase severity (`info`, `error`, `warning`, ...).
    pub level: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Watched file the event was read from.
    #[serde(rename = "file_path")]
    pub origin: PathBuf,
    pub details: Details,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn category(&self) -> Category {
        self.details.category()
    }

    /// Whether this event is also broadcast on the alert channel.
    pub fn is_alert(&self) -> bool {
        is_alert_level(&self.level)
    }

    /// The ISO week partition this event belongs to. Fixed by `timestamp`.
    pub fn week(&self) -> Week {
        Week::of(&self.timestamp)
    }
}

/// Category-specific attributes. The variant is the event's category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum Details {
    Request(RequestDetails),
    Error(ErrorDetails),
    Info(InfoDetails),
}

impl Details {
    pub fn category(&self) -> Category {
        match self {
            Details::Request(_) => Category::Request,
            Details::Error(_) => Category::Error,
            Details::Info(_) => Category::Info,
        }
    }
}

/// Attributes of an HTTP request / access record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub method: String,
    pub endpoint: String,
    pub status_code: u16,
    /// Request duration in milliseconds; `0` when the source value is unparseable.
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
}

/// Attributes of an error or warning record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub code: CodeLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    /// Coarse classification derived from the message (`validation_error`, `db_error`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// Attributes of a general informational record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub code: CodeLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

/// Where in the emitting service's code a record was logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

// ---------------------------------------------------------------------------
// Week
// ---------------------------------------------------------------------------

/// An ISO-8601 week, rendered as `YYYY_Www` (e.g. `2025_W27`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Week {
    pub year: i32,
    pub week: u32,
}

impl Week {
    pub fn of(ts: &DateTime<Utc>) -> Self {
        let iso = ts.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn current() -> Self {
        Self::of(&Utc::now())
    }
}

impl std::fmt::Display for Week {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_W{:02}", self.year, self.week)
    }
}

impl FromStr for Week {
    type Err = InvalidWeek;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidWeek(s.to_string());
        let (year, week) = s.split_once("_W").ok_or_else(invalid)?;
        if year.len() != 4 || week.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let week = week.parse().map_err(|_| invalid())?;
        if !(1..=53).contains(&week) {
            return Err(invalid());
        }
        Ok(Week { year, week })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid week key: {0:?} (expected YYYY_Www)")]
pub struct InvalidWeek(pub String);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
