//! Domain-specific assertion macros for unilog harnesses.
//!
//! These add context to failure messages so it is clear which pipeline
//! stage produced the wrong event.

use unilog_core::{Broadcast, Event, EventStore, Partition, Week};
use unilog_core::{Category, CategoryFilter};

// ---------------------------------------------------------------------------
// Event assertions
// ---------------------------------------------------------------------------

/// Assert an event's category.
///
/// ```rust
/// assert_category!(event, Category::Error);
/// ```
#[macro_export]
macro_rules! assert_category {
    ($event:expr, $category:expr) => {{
        let event: &unilog_core::Event = &$event;
        let expected: unilog_core::Category = $category;
        if event.category() != expected {
            panic!(
                "assert_category! failed:\n  expected: {:?}\n  actual:   {:?}\n  message: {:?}",
                expected,
                event.category(),
                event.message
            );
        }
    }};
}

/// Assert an event's (lowercase) level.
#[macro_export]
macro_rules! assert_level {
    ($event:expr, $level:expr) => {{
        let event: &unilog_core::Event = &$event;
        let expected: &str = $level;
        if event.level != expected {
            panic!(
                "assert_level! failed:\n  expected: {:?}\n  actual:   {:?}\n  message: {:?}",
                expected, event.level, event.message
            );
        }
    }};
}

/// Assert which service an event came from.
#[macro_export]
macro_rules! assert_source {
    ($event:expr, $source:expr) => {{
        let event: &unilog_core::Event = &$event;
        let expected: unilog_core::Source = $source;
        if event.source != expected {
            panic!(
                "assert_source! failed:\n  expected: {:?}\n  actual:   {:?}\n  origin: {}",
                expected,
                event.source,
                event.origin.display()
            );
        }
    }};
}

// ---------------------------------------------------------------------------
// Broadcast assertions
// ---------------------------------------------------------------------------

/// Assert the exact sequence of channel names a set of broadcasts went out on.
///
/// ```rust
/// assert_channels!(sub.drain(), ["new_log", "new_error", "error_detected"]);
/// ```
#[macro_export]
macro_rules! assert_channels {
    ($messages:expr, [$($name:expr),* $(,)?]) => {{
        let messages: &[unilog_core::Broadcast] = &$messages;
        let actual: Vec<&str> = messages.iter().map(|m| m.channel.name()).collect();
        let expected: Vec<&str> = vec![$($name),*];
        pretty_assertions::assert_eq!(actual, expected, "broadcast channels");
    }};
}

/// Events carried by a set of broadcasts, in order.
pub fn broadcast_events(messages: &[Broadcast]) -> Vec<&Event> {
    messages.iter().filter_map(Broadcast::event).collect()
}

// ---------------------------------------------------------------------------
// Store assertions
// ---------------------------------------------------------------------------

/// Assert that `event` is stored in its own category partition and in the
/// `all` partition for its week, and in no other category's partition.
pub fn assert_partitioned(store: &EventStore, event: &Event) {
    let week = Week::of(&event.timestamp);
    for category in Category::ALL {
        let stored = store
            .query(CategoryFilter::Only(category), None, Some(week))
            .expect("query category partition");
        let present = stored.contains(event);
        let expected = category == event.category();
        assert_eq!(
            present,
            expected,
            "event {:?} {} partition {}",
            event.message,
            if expected { "missing from" } else { "unexpectedly in" },
            Partition::new(category, week).file_name()
        );
    }
    let all = store
        .query(CategoryFilter::All, None, Some(week))
        .expect("query all partition");
    assert!(
        all.contains(event),
        "event {:?} missing from {}",
        event.message,
        Partition::new(CategoryFilter::All, week).file_name()
    );
}

/// Count occurrences of `event` across one week's `all` partition.
pub fn stored_copies(store: &EventStore, event: &Event) -> usize {
    store
        .query(CategoryFilter::All, None, Some(event.week()))
        .expect("query all partition")
        .iter()
        .filter(|e| *e == event)
        .count()
}
