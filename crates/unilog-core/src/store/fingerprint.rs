//! Content fingerprints and the set of fingerprints already persisted.

use crate::types::Event;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// SHA-256 over `(timestamp, source, message, level, origin file)`. Two
/// events with equal fingerprints are the same occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(event: &Event) -> Self {
        let timestamp = event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let origin = event.origin.to_string_lossy();
        let mut hasher = Sha256::new();
        for part in [
            timestamp.as_str(),
            event.source.as_str(),
            event.message.as_str(),
            event.level.as_str(),
            origin.as_ref(),
        ] {
            // length prefix keeps ("ab", "c") and ("a", "bc") apart
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Every fingerprint accepted so far, with the timestamp of its event.
///
/// With a retention window, fingerprints of events older than the window
/// can be pruned; without one the set only grows.
#[derive(Debug, Default)]
pub struct FingerprintSet {
    seen: HashMap<Fingerprint, DateTime<Utc>>,
    retention: Option<Duration>,
}

impl FingerprintSet {
    pub fn new(retention: Option<Duration>) -> Self {
        Self {
            seen: HashMap::new(),
            retention,
        }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains_key(fingerprint)
    }

    /// Record a fingerprint. Returns `false` if it was already present.
    pub fn insert(&mut self, fingerprint: Fingerprint, event_ts: DateTime<Utc>) -> bool {
        match self.seen.entry(fingerprint) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(event_ts);
                true
            }
        }
    }

    /// Whether an event at `event_ts` is inside the retention window.
    pub fn retains(&self, event_ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.retention.is_none_or(|window| event_ts >= now - window)
    }

    /// Drop fingerprints outside the retention window. Returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let Some(window) = self.retention else {
            return 0;
        };
        let cutoff = now - window;
        let before = self.seen.len();
        self.seen.retain(|_, ts| *ts >= cutoff);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
