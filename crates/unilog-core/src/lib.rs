//! unilog-core — normalisation, storage and broadcast for unified logs.
//!
//! This crate holds every pipeline stage that does not touch the watched
//! filesystem, plus the types shared across them.
//!
//! # Architecture
//!
//! ```text
//! RawLine ──► Normalizer ──► EventStore ──► Publisher
//!                 │              │              │
//!               Event       JSONL partitions   new_log / new_<category>
//!                                               error_detected / stats_update
//! ```
//!
//! The watcher that produces [`RawLine`]s lives in `unilog-feeds`; the
//! batching dispatcher that drives these stages lives in the `unilog`
//! crate.

pub mod config;
pub mod normalizer;
pub mod publisher;
pub mod stats;
pub mod store;
pub mod types;

pub use normalizer::Normalizer;
pub use publisher::{Broadcast, Channel, Publisher, Subscription};
pub use stats::{StatsSnapshot, StatsTally};
pub use store::{EventStore, Partition, StoreError};
pub use types::{Category, CategoryFilter, Event, RawLine, Source, Week};
