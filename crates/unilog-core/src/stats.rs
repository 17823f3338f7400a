//! Aggregate counts over one week of stored events, broadcast on the
//! `stats_update` channel after each batch that accepted something.

use crate::types::{Category, Event, Source, Week};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Levels always present in [`StatsSnapshot::by_level`], even at zero.
const REPORTED_LEVELS: [&str; 4] = ["info", "error", "warning", "access"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub week: String,
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub by_source: BTreeMap<Source, usize>,
    /// Per-level counts; `warn` is folded into `warning`.
    pub by_level: BTreeMap<String, usize>,
    pub last_hour: usize,
    pub last_24h: usize,
}

impl StatsSnapshot {
    /// One-shot snapshot over a slice of events.
    pub fn compute(week: Week, events: &[Event], now: DateTime<Utc>) -> Self {
        let mut tally = StatsTally::new(week);
        for event in events {
            tally.record(event);
        }
        tally.snapshot(now)
    }
}

/// Running counts for one week, updated as events are accepted so a
/// snapshot never has to re-read the week's partition.
///
/// Only timestamps that can still fall in the last 24 hours are kept.
#[derive(Debug, Clone)]
pub struct StatsTally {
    week: Week,
    total: usize,
    by_category: BTreeMap<Category, usize>,
    by_source: BTreeMap<Source, usize>,
    by_level: BTreeMap<String, usize>,
    recent: Vec<DateTime<Utc>>,
}

impl StatsTally {
    pub fn new(week: Week) -> Self {
        Self {
            week,
            total: 0,
            by_category: Category::ALL.iter().map(|c| (*c, 0)).collect(),
            by_source: Source::ALL.iter().map(|s| (*s, 0)).collect(),
            by_level: REPORTED_LEVELS.iter().map(|l| (l.to_string(), 0)).collect(),
            recent: Vec::new(),
        }
    }

    pub fn week(&self) -> Week {
        self.week
    }

    pub fn record(&mut self, event: &Event) {
        self.total += 1;
        *self.by_category.entry(event.category()).or_default() += 1;
        *self.by_source.entry(event.source).or_default() += 1;
        let level = match event.level.as_str() {
            "warn" => "warning",
            other => other,
        };
        *self.by_level.entry(level.to_string()).or_default() += 1;
        self.recent.push(event.timestamp);
    }

    /// Snapshot as of `now`. Timestamps older than 24 hours are dropped
    /// from the tally, so `now` must not go backwards between calls.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> StatsSnapshot {
        let hour_ago = now - Duration::hours(1);
        let day_ago = now - Duration::hours(24);
        self.recent.retain(|ts| *ts >= day_ago);

        StatsSnapshot {
            week: self.week.to_string(),
            generated_at: now,
            total: self.total,
            by_category: self.by_category.clone(),
            by_source: self.by_source.clone(),
            by_level: self.by_level.clone(),
            last_hour: self.recent.iter().filter(|ts| **ts >= hour_ago).count(),
            last_24h: self.recent.len(),
        }
    }
}
