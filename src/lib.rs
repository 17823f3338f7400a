//! unilog — unified log ingestion.
//!
//! Tails the log directories of two services, normalises every line into
//! one event schema, persists each event once into weekly JSONL partitions,
//! and broadcasts accepted events to live subscribers. This crate holds the
//! ingestion queue, the batching dispatcher and the pipeline lifecycle; the
//! stages themselves live in `unilog-core` and `unilog-feeds`.
//!
//! # Architecture
//!
//! ```text
//! FileWatcher ──► IngestQueue ──► Dispatcher ──► Normalizer ──► EventStore ──► Publisher
//!  (unilog-feeds)      (bounded)     (batches)               (unilog-core)
//! ```
//!
//! One producer path per watched root feeds a single queue with a single
//! consumer, because store appends are serialised anyway.

pub mod dispatcher;
pub mod pipeline;

pub use dispatcher::{BatchReport, CounterSnapshot, Dispatcher, IngestQueue, QueueError};
pub use pipeline::Pipeline;
