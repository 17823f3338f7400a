//! Per-file read cursors.
//!
//! A [`Tailer`] remembers, for every file it has read, the byte offset just
//! past the last complete line and the file's identity (inode on Unix). A
//! read returns only lines that were finished since the previous read; a
//! trailing line without its newline is left for the next read.
//!
//! Reads go through a buffered reader one line at a time, and a single
//! call stops once it has consumed about [`DEFAULT_MAX_READ`] bytes, so a
//! large backlog is worked through in several calls.
//!
//! Rotation is detected when the file is now shorter than the cursor or its
//! identity changed. Either way the cursor resets to zero and the file is
//! read from the start.

use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use unilog_core::RawLine;

/// Bytes of complete lines one [`Tailer::read_new_lines`] call may consume.
pub const DEFAULT_MAX_READ: u64 = 1 << 20;

const READ_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Byte offset just past the last consumed newline.
    pub offset: u64,
    /// Inode at the last read, where the platform has one.
    pub file_id: Option<u64>,
    /// Set once the file has been read from the beginning at least once.
    pub initial_read_complete: bool,
}

#[derive(Debug)]
pub struct Tailer {
    cursors: HashMap<PathBuf, Cursor>,
    max_read: u64,
}

impl Default for Tailer {
    fn default() -> Self {
        Self::with_max_read(DEFAULT_MAX_READ)
    }
}

impl Tailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_read(max_read: u64) -> Self {
        Self {
            cursors: HashMap::new(),
            max_read: max_read.max(1),
        }
    }

    pub fn cursor(&self, path: &Path) -> Option<&Cursor> {
        self.cursors.get(path)
    }

    /// Drop the cursor of a deleted file. Returns whether one existed.
    pub fn forget(&mut self, path: &Path) -> bool {
        self.cursors.remove(path).is_some()
    }

    pub fn tracked_files(&self) -> usize {
        self.cursors.len()
    }

    /// Complete lines appended to `path` since the previous call, with
    /// surrounding whitespace stripped and blank lines skipped. A file never
    /// seen before is read from the start.
    ///
    /// At most about `max_read` bytes are consumed per call; an empty result
    /// means every complete line has been read.
    pub async fn read_new_lines(&mut self, path: &Path) -> io::Result<Vec<RawLine>> {
        let meta = tokio::fs::metadata(path).await?;
        let len = meta.len();
        let id = file_id(&meta);

        let cursor = self.cursors.entry(path.to_path_buf()).or_default();
        let replaced = matches!((cursor.file_id, id), (Some(old), Some(new)) if old != new);
        if len < cursor.offset || replaced {
            tracing::info!(
                path = %path.display(),
                offset = cursor.offset,
                len,
                replaced,
                "rotation detected; reading from start"
            );
            cursor.offset = 0;
        }
        cursor.file_id = id;

        if len == cursor.offset {
            cursor.initial_read_complete = true;
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(cursor.offset)).await?;
        let mut reader = BufReader::with_capacity(READ_BUFFER, file);

        let mut lines = Vec::new();
        let mut consumed = 0u64;
        let mut buf = Vec::new();
        while consumed < self.max_read || lines.is_empty() {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).await?;
            // EOF, or a trailing fragment still waiting for its newline.
            if n == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            consumed += n as u64;
            cursor.offset += n as u64;
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(RawLine::new(path, line));
            }
        }
        cursor.initial_read_complete = true;
        Ok(lines)
    }
}

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Eligible files under `root`, sorted. Descends into subdirectories only
/// when `recursive` is set; unreadable subdirectories are skipped.
pub async fn discover(
    root: &Path,
    recursive: bool,
    eligible: impl Fn(&Path) -> bool,
) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir.as_path() == root => return Err(e),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if eligible(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
