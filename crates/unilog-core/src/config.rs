//! Configuration types for unilog.
//!
//! [`Config::load`] layers, in order: the built-in defaults, a TOML file
//! (an explicit path, or `~/.config/unilog/config.toml` which is created with
//! the defaults if it does not yet exist), and `UNILOG_*` environment
//! variables (`UNILOG_DISPATCH__BATCH_SIZE=50`). [`Config::defaults`] returns
//! the defaults without touching the filesystem (useful in tests).

use crate::types::Source;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[sources]
primary         = "node_logs"
secondary       = "python_logs"
recursive       = true
extensions      = ["log"]
request_markers = ["requestsLogs", "access-"]

[storage]
base_dir                   = "unified_logs"
fingerprint_retention_days = 0

[dispatch]
queue_capacity  = 10000
batch_size      = 10
batch_window_ms = 100
shutdown        = "drain"

[publisher]
channel_capacity = 1024
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

/// `[sources]`: the two watched roots and which files in them are eligible.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_primary")]
    pub primary: PathBuf,
    #[serde(default = "default_secondary")]
    pub secondary: PathBuf,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// File extensions (without the dot) that mark a file as a log file.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Path fragments that mark every record in a file as a request record.
    #[serde(default = "default_request_markers")]
    pub request_markers: Vec<String>,
}

fn default_primary() -> PathBuf { PathBuf::from("node_logs") }
fn default_secondary() -> PathBuf { PathBuf::from("python_logs") }
fn default_recursive() -> bool { true }
fn default_extensions() -> Vec<String> { vec!["log".to_string()] }
fn default_request_markers() -> Vec<String> {
    vec!["requestsLogs".to_string(), "access-".to_string()]
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
            recursive: default_recursive(),
            extensions: default_extensions(),
            request_markers: default_request_markers(),
        }
    }
}

impl SourcesConfig {
    /// The watched roots paired with the service each belongs to.
    pub fn roots(&self) -> Vec<WatchRoot> {
        vec![
            WatchRoot::new(self.primary.clone(), Source::Primary),
            WatchRoot::new(self.secondary.clone(), Source::Secondary),
        ]
    }

    /// Whether `path` has one of the configured log-file extensions.
    pub fn is_log_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// A monitored directory and the service whose logs it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub source: Source,
}

impl WatchRoot {
    pub fn new(path: impl Into<PathBuf>, source: Source) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// `[storage]`: where partitions live and how long fingerprints are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Keep fingerprints only for events newer than this many days. `0` keeps
    /// every fingerprint for the lifetime of the process.
    #[serde(default)]
    pub fingerprint_retention_days: u32,
}

fn default_base_dir() -> PathBuf { PathBuf::from("unified_logs") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            fingerprint_retention_days: 0,
        }
    }
}

impl StorageConfig {
    pub fn fingerprint_retention(&self) -> Option<chrono::Duration> {
        match self.fingerprint_retention_days {
            0 => None,
            days => Some(chrono::Duration::days(i64::from(days))),
        }
    }
}

/// `[dispatch]`: ingestion queue bounds and batching window.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
    #[serde(default)]
    pub shutdown: ShutdownPolicy,
}

fn default_queue_capacity() -> usize { 10_000 }
fn default_batch_size() -> usize { 10 }
fn default_batch_window_ms() -> u64 { 100 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            batch_window_ms: default_batch_window_ms(),
            shutdown: ShutdownPolicy::default(),
        }
    }
}

impl DispatchConfig {
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

/// What the dispatcher does with queued lines when it is stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Refuse new lines, process everything already queued, then exit.
    #[default]
    Drain,
    /// Exit after the in-flight batch; queued lines are dropped.
    Immediate,
}

/// `[publisher]`: live fan-out buffer.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Messages buffered per subscriber before a slow subscriber starts lagging.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize { 1024 }

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load configuration layered over the built-in defaults.
    ///
    /// With `path = None` the per-user file is used, and created with the
    /// defaults if it does not exist. An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => {
                let path = config_path();
                if !path.exists() {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
                }
                config::File::from(path.as_path()).required(false)
            }
        };

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("UNILOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("unilog")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
