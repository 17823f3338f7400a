//! Partition files: one JSONL file per `(category, week)` plus one `all`
//! file per week, named `unified_<category>_logs_<YYYY>_W<WW>.jsonl`.

use crate::types::{Category, CategoryFilter, Event, Week};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const PREFIX: &str = "unified_";
const INFIX: &str = "_logs_";
const EXTENSION: &str = ".jsonl";

/// A single partition file, identified by its category selector and week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub filter: CategoryFilter,
    pub week: Week,
}

impl Partition {
    pub fn new(filter: impl Into<CategoryFilter>, week: Week) -> Self {
        Self {
            filter: filter.into(),
            week,
        }
    }

    /// The two partitions every event is written to.
    pub fn targets(event: &Event) -> [Partition; 2] {
        let week = event.week();
        [
            Partition::new(event.category(), week),
            Partition::new(CategoryFilter::All, week),
        ]
    }

    pub fn file_name(&self) -> String {
        format!("{PREFIX}{}{INFIX}{}{EXTENSION}", self.filter.as_str(), self.week)
    }

    pub fn path_in(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(self.file_name())
    }

    /// Inverse of [`Partition::file_name`]. Foreign files yield `None`.
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
        let (filter, week) = rest.split_once(INFIX)?;
        let filter = match filter {
            "all" => CategoryFilter::All,
            other => CategoryFilter::Only(other.parse::<Category>().ok()?),
        };
        Some(Self {
            filter,
            week: week.parse().ok()?,
        })
    }
}

/// Append one serialised record as a single line.
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
}

/// Length of a partition file before a write; `None` if it is not a file yet.
pub fn len_before_write(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

/// Undo an append: cut the file back to `len`, or remove it if the append
/// created it.
pub fn rollback(path: &Path, len: Option<u64>) -> io::Result<()> {
    match len {
        Some(len) => OpenOptions::new().write(true).open(path)?.set_len(len),
        None => match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        },
    }
}

/// Outcome of reading a partition file.
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub events: Vec<Event>,
    /// Lines that were not valid events and were skipped.
    pub corrupt: usize,
}

/// Read every event in a partition file. A missing file reads as empty.
pub fn read_events(path: &Path) -> io::Result<ReadOutcome> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ReadOutcome::default()),
        Err(e) => return Err(e),
    };

    let mut outcome = ReadOutcome::default();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(&line) {
            Ok(event) => outcome.events.push(event),
            Err(e) => {
                outcome.corrupt += 1;
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping corrupt partition line"
                );
            }
        }
    }
    Ok(outcome)
}
