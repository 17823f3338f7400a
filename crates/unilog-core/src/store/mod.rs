//! Deduplicating event store.
//!
//! Events are persisted as JSON lines, partitioned by category and ISO
//! week, with every event also written to the week's `all` partition. A
//! content fingerprint is kept for every accepted event; a second event
//! with the same fingerprint is rejected, which makes re-reading a file
//! after a restart harmless.
//!
//! # Locking
//!
//! One [`parking_lot::RwLock`] guards the fingerprint set, the current
//! week's stats tally, and serialises file access. `append` holds the write
//! lock across check, write and record, so concurrent appends of the same
//! event persist it once. `query` holds the read lock, so readers never
//! observe a half-written line and may run alongside each other.
//!
//! An append lands in both of its partitions or in neither: if the second
//! write fails, the first is cut back to its previous length.
//!
//! ```text
//!  base_dir/
//!    unified_error_logs_2025_W27.jsonl
//!    unified_info_logs_2025_W27.jsonl
//!    unified_request_logs_2025_W27.jsonl
//!    unified_all_logs_2025_W27.jsonl
//! ```

mod fingerprint;
mod partition;

pub use fingerprint::{Fingerprint, FingerprintSet};
pub use partition::Partition;

use crate::config::StorageConfig;
use crate::stats::{StatsSnapshot, StatsTally};
use crate::types::{CategoryFilter, Event, Week};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot create storage directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("cannot list storage directory {}: {source}", path.display())]
    ListDir { path: PathBuf, source: io::Error },

    #[error("cannot read partition {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write partition {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("cannot serialise event: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Summary of [`EventStore::initialize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    pub partitions: usize,
    pub fingerprints: usize,
    pub corrupt_lines: usize,
}

pub struct EventStore {
    base_dir: PathBuf,
    state: RwLock<State>,
}

struct State {
    fingerprints: FingerprintSet,
    /// Counts for the current week; built from disk on first use.
    tally: Option<StatsTally>,
}

impl EventStore {
    /// Open (creating if needed) the storage directory. The fingerprint set
    /// starts empty; call [`EventStore::initialize`] before accepting events.
    pub fn open(
        base_dir: impl Into<PathBuf>,
        fingerprint_retention: Option<Duration>,
    ) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|source| StoreError::CreateDir {
            path: base_dir.clone(),
            source,
        })?;
        Ok(Self {
            base_dir,
            state: RwLock::new(State {
                fingerprints: FingerprintSet::new(fingerprint_retention),
                tally: None,
            }),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        Self::open(&config.base_dir, config.fingerprint_retention())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Seed the fingerprint set from every partition already on disk.
    /// Corrupt lines are skipped with a warning.
    pub fn initialize(&self) -> Result<InitReport, StoreError> {
        let now = Utc::now();
        let mut state = self.state.write();
        let set = &mut state.fingerprints;
        let mut report = InitReport::default();

        for partition in self.partitions()? {
            let path = partition.path_in(&self.base_dir);
            let outcome = partition::read_events(&path)
                .map_err(|source| StoreError::Read { path, source })?;
            report.partitions += 1;
            report.corrupt_lines += outcome.corrupt;
            for event in outcome.events {
                if set.retains(event.timestamp, now) {
                    set.insert(Fingerprint::of(&event), event.timestamp);
                }
            }
        }

        report.fingerprints = set.len();
        tracing::info!(
            dir = %self.base_dir.display(),
            partitions = report.partitions,
            fingerprints = report.fingerprints,
            corrupt_lines = report.corrupt_lines,
            "store initialised"
        );
        Ok(report)
    }

    /// Persist an event unless an identical one already exists.
    ///
    /// Returns `Ok(true)` when the event was written, `Ok(false)` for a
    /// duplicate. With a retention window, events older than the window are
    /// also refused with `Ok(false)`: their fingerprints may already have
    /// been forgotten, so storing them could duplicate. On a write error
    /// nothing is recorded and no partition keeps the line, so the same
    /// event may be offered again later.
    pub fn append(&self, event: &Event) -> Result<bool, StoreError> {
        let fingerprint = Fingerprint::of(event);
        let mut state = self.state.write();
        if state.fingerprints.contains(&fingerprint) {
            tracing::debug!(%fingerprint, origin = %event.origin.display(), "duplicate event");
            return Ok(false);
        }
        if !state.fingerprints.retains(event.timestamp, Utc::now()) {
            tracing::debug!(
                %fingerprint,
                timestamp = %event.timestamp,
                "event older than fingerprint retention window; skipped"
            );
            return Ok(false);
        }

        let line = serde_json::to_string(event)?;
        let mut written: Vec<(PathBuf, Option<u64>)> = Vec::with_capacity(2);
        for partition in Partition::targets(event) {
            let path = partition.path_in(&self.base_dir);
            let len_before = partition::len_before_write(&path);
            if let Err(source) = partition::append_line(&path, &line) {
                if path.is_file() {
                    written.push((path.clone(), len_before));
                }
                for (done, len) in written.iter().rev() {
                    if let Err(e) = partition::rollback(done, *len) {
                        tracing::warn!(
                            path = %done.display(),
                            error = %e,
                            "cannot roll back partial append"
                        );
                    }
                }
                return Err(StoreError::Write { path, source });
            }
            written.push((path, len_before));
        }

        state.fingerprints.insert(fingerprint, event.timestamp);
        if let Some(tally) = state.tally.as_mut().filter(|t| t.week() == event.week()) {
            tally.record(event);
        }
        Ok(true)
    }

    /// Events in one partition, optionally filtered by level
    /// (case-insensitive). `week` defaults to the current week. A partition
    /// with no file yields an empty list.
    pub fn query(
        &self,
        filter: CategoryFilter,
        level: Option<&str>,
        week: Option<Week>,
    ) -> Result<Vec<Event>, StoreError> {
        let partition = Partition::new(filter, week.unwrap_or_else(|| self.current_week()));
        let path = partition.path_in(&self.base_dir);

        let _guard = self.state.read();
        let outcome = partition::read_events(&path)
            .map_err(|source| StoreError::Read { path, source })?;

        let mut events = outcome.events;
        if let Some(level) = level {
            events.retain(|e| e.level.eq_ignore_ascii_case(level));
        }
        Ok(events)
    }

    /// Distinct weeks that have at least one partition file, newest first.
    pub fn available_weeks(&self) -> Result<Vec<Week>, StoreError> {
        let _guard = self.state.read();
        let weeks: BTreeSet<Week> = self.partitions()?.into_iter().map(|p| p.week).collect();
        Ok(weeks.into_iter().rev().collect())
    }

    pub fn current_week(&self) -> Week {
        Week::current()
    }

    /// Aggregate counts for the week containing `now`.
    ///
    /// The first call of a week reads that week's `all` partition; later
    /// calls use counts kept up to date by [`EventStore::append`].
    pub fn stats_snapshot(&self, now: DateTime<Utc>) -> Result<StatsSnapshot, StoreError> {
        let week = Week::of(&now);
        let mut state = self.state.write();
        let tally = match state.tally.take() {
            Some(tally) if tally.week() == week => tally,
            _ => {
                let path = Partition::new(CategoryFilter::All, week).path_in(&self.base_dir);
                let outcome = partition::read_events(&path)
                    .map_err(|source| StoreError::Read { path, source })?;
                let mut tally = StatsTally::new(week);
                for event in &outcome.events {
                    tally.record(event);
                }
                tally
            }
        };
        Ok(state.tally.insert(tally).snapshot(now))
    }

    /// Forget fingerprints older than the retention window.
    pub fn prune_fingerprints(&self, now: DateTime<Utc>) -> usize {
        let pruned = self.state.write().fingerprints.prune(now);
        if pruned > 0 {
            tracing::debug!(pruned, "pruned fingerprints outside retention window");
        }
        pruned
    }

    pub fn fingerprint_count(&self) -> usize {
        self.state.read().fingerprints.len()
    }

    fn partitions(&self) -> Result<Vec<Partition>, StoreError> {
        let list_err = |source| StoreError::ListDir {
            path: self.base_dir.clone(),
            source,
        };
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if let Some(partition) = entry.file_name().to_str().and_then(Partition::parse_file_name) {
                found.push(partition);
            }
        }
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
