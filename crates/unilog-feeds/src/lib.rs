//! unilog-feeds — the file feed for unilog.
//!
//! Walks the two watched roots, reads every eligible log file from its
//! start, then follows appends through filesystem notifications. Each
//! complete, non-blank line is handed to a [`LineSink`] as a
//! [`unilog_core::RawLine`]; everything downstream of that lives in
//! `unilog-core` and the `unilog` dispatcher.

pub mod error;
pub mod tail;
pub mod watcher;

pub use error::WatchError;
pub use tail::{Cursor, Tailer};
pub use watcher::{FileWatcher, LineSink, ScanReport};
