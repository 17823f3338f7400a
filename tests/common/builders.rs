//! Test builders: an on-disk environment with both watched roots, and a
//! fluent constructor for [`Event`] values.
//!
//! These are for readability in tests, not production use. They panic on
//! I/O failure rather than returning `Result`.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use unilog_core::config::{Config, WatchRoot};
use unilog_core::types::{Details, ErrorDetails, InfoDetails, RequestDetails};
use unilog_core::{Category, Event, Normalizer, RawLine, Source};

// ---------------------------------------------------------------------------
// TestEnv
// ---------------------------------------------------------------------------

/// A temporary directory holding `node_logs/`, `python_logs/` and
/// `unified_logs/`.
pub struct TestEnv {
    _dir: tempfile::TempDir,
    pub primary: PathBuf,
    pub secondary: PathBuf,
    pub storage: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        // Resolve symlinked temp roots so paths match what the pipeline sees.
        let base = std::fs::canonicalize(dir.path()).expect("canonical tempdir");
        let primary = base.join("node_logs");
        let secondary = base.join("python_logs");
        let storage = base.join("unified_logs");
        std::fs::create_dir_all(&primary).expect("create primary root");
        std::fs::create_dir_all(&secondary).expect("create secondary root");
        Self {
            _dir: dir,
            primary,
            secondary,
            storage,
        }
    }

    /// Defaults pointed at this environment, with a short batch window.
    pub fn config(&self) -> Config {
        let mut config = Config::defaults();
        config.sources.primary = self.primary.clone();
        config.sources.secondary = self.secondary.clone();
        config.storage.base_dir = self.storage.clone();
        config.dispatch.batch_window_ms = 20;
        config
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(&self.config().sources)
    }

    pub fn root(&self, source: Source) -> &Path {
        match source {
            Source::Primary => &self.primary,
            Source::Secondary => &self.secondary,
        }
    }

    /// Append lines (each followed by `\n`) to `rel` under a root, creating
    /// parent directories as needed. Returns the file's path.
    pub fn append(&self, source: Source, rel: &str, lines: &[&str]) -> PathBuf {
        let path = self.root(source).join(rel);
        append_lines(&path, lines);
        path
    }

    /// A raw line as if read from `rel` under a root.
    pub fn raw(&self, source: Source, rel: &str, content: &str) -> RawLine {
        RawLine::new(self.root(source).join(rel), content)
    }

    pub fn roots(&self) -> Vec<WatchRoot> {
        self.config().sources.roots()
    }
}

pub fn append_lines(path: &Path, lines: &[&str]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open log file");
    for line in lines {
        writeln!(file, "{line}").expect("append line");
    }
}

/// Poll `check` until it holds or `timeout` passes. Returns the last result.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ---------------------------------------------------------------------------
// EventBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Event`] fixtures.
///
/// ```rust
/// let event = EventBuilder::new("db down")
///     .category(Category::Error)
///     .level("error")
///     .at(2025, 7, 1, 10)
///     .build();
/// ```
pub struct EventBuilder {
    message: String,
    source: Source,
    level: String,
    timestamp: DateTime<Utc>,
    origin: PathBuf,
    category: Category,
}

impl EventBuilder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: Source::Primary,
            level: "info".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap(),
            origin: PathBuf::from("/logs/node_logs/app.log"),
            category: Category::Info,
        }
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }

    pub fn at(self, year: i32, month: u32, day: u32, hour: u32) -> Self {
        self.timestamp(Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap())
    }

    pub fn origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn build(self) -> Event {
        let details = match self.category {
            Category::Info => Details::Info(InfoDetails::default()),
            Category::Error => Details::Error(ErrorDetails::default()),
            Category::Request => Details::Request(RequestDetails {
                method: "GET".into(),
                endpoint: "/".into(),
                status_code: 200,
                ..RequestDetails::default()
            }),
        };
        Event {
            source: self.source,
            level: self.level,
            timestamp: self.timestamp,
            message: self.message,
            origin: self.origin,
            details,
            extra: BTreeMap::new(),
        }
    }
}

/// Build `n` distinct events cycling through the categories.
pub fn build_events(n: usize) -> Vec<Event> {
    (0..n)
        .map(|i| {
            let category = Category::ALL[i % 3];
            let level = if category == Category::Error { "error" } else { "info" };
            EventBuilder::new(format!("event {i}"))
                .category(category)
                .level(level)
                .timestamp(
                    Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::seconds(i as i64),
                )
                .build()
        })
        .collect()
}
