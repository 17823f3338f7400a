//! Ingestion queue and batching dispatcher.
//!
//! ```text
//! FileWatcher ──submit──► IngestQueue (bounded) ──► dispatcher task
//!                                                      │ batch: ≤ batch_size lines,
//!                                                      │ closed early when the queue
//!                                                      │ is empty or the window ends
//!                                                      ▼
//!                                     spawn_blocking(BatchProcessor::process)
//!                                     normalize ─► store.append ─► publish
//! ```
//!
//! The file watcher enqueues with [`IngestQueue::send`], which waits for
//! room, so a burst larger than the queue slows the watcher instead of
//! losing lines. [`IngestQueue::submit`] never waits: a full queue rejects
//! the line. The single consumer keeps per-file order because lines are
//! queued in file order.
//!
//! # Stopping
//!
//! | Policy                     | Queued lines            | In-flight batch |
//! |----------------------------|-------------------------|-----------------|
//! | [`ShutdownPolicy::Drain`]     | processed, then exit    | finished        |
//! | [`ShutdownPolicy::Immediate`] | dropped and counted     | finished        |
//!
//! Either way the queue is closed first, so later submits fail with
//! [`QueueError::Closed`].

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use unilog_core::config::{DispatchConfig, ShutdownPolicy};
use unilog_core::{EventStore, Normalizer, Publisher, RawLine};
use unilog_feeds::LineSink;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Cumulative ingestion counters, shared between the queue handle and the
/// dispatcher task.
#[derive(Clone, Default)]
pub struct IngestCounters {
    inner: Arc<CountersInner>,
}

#[derive(Default)]
struct CountersInner {
    received: AtomicU64,
    dropped: AtomicU64,
    accepted: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    batches: AtomicU64,
}

/// Point-in-time copy of [`IngestCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Lines taken into the queue.
    pub received: u64,
    /// Lines refused by a full or closed queue, or discarded on an immediate stop.
    pub dropped: u64,
    /// Events persisted and published.
    pub accepted: u64,
    /// Events already present in the store.
    pub duplicates: u64,
    /// Lines the normalizer could not turn into an event.
    pub rejected: u64,
    /// Events lost to a store error.
    pub failed: u64,
    pub batches: u64,
}

impl IngestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let i = &self.inner;
        CounterSnapshot {
            received: load(&i.received),
            dropped: load(&i.dropped),
            accepted: load(&i.accepted),
            duplicates: load(&i.duplicates),
            rejected: load(&i.rejected),
            failed: load(&i.failed),
            batches: load(&i.batches),
        }
    }

    fn add(counter: &AtomicU64, n: usize) {
        if n > 0 {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    fn record_batch(&self, report: &BatchReport) {
        let i = &self.inner;
        Self::add(&i.accepted, report.accepted);
        Self::add(&i.duplicates, report.duplicates);
        Self::add(&i.rejected, report.rejected);
        Self::add(&i.failed, report.failed);
        i.batches.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("ingestion queue is full")]
    Full,
    #[error("ingestion queue is closed")]
    Closed,
}

/// Producer handle for the ingestion queue. Cheap to clone.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<RawLine>,
    counters: IngestCounters,
}

impl IngestQueue {
    /// Enqueue without waiting.
    pub fn submit(&self, line: RawLine) -> Result<(), QueueError> {
        let result = self.tx.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        });
        let counter = match result {
            Ok(()) => &self.counters.inner.received,
            Err(_) => &self.counters.inner.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Enqueue, waiting while the queue is full. Fails only once the queue
    /// is closed.
    pub async fn send(&self, line: RawLine) -> Result<(), QueueError> {
        let result = self.tx.send(line).await.map_err(|_| QueueError::Closed);
        let counter = match result {
            Ok(()) => &self.counters.inner.received,
            Err(_) => &self.counters.inner.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Lines currently waiting.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LineSink for IngestQueue {
    async fn submit(&self, line: RawLine) -> bool {
        let path = line.source_file.clone();
        match self.send(line).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "line dropped");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Batch processing
// ---------------------------------------------------------------------------

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub size: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Normalise, persist and publish lines. Runs on a blocking thread.
pub struct BatchProcessor {
    normalizer: Normalizer,
    store: Arc<EventStore>,
    publisher: Publisher,
}

impl BatchProcessor {
    pub fn new(normalizer: Normalizer, store: Arc<EventStore>, publisher: Publisher) -> Self {
        Self {
            normalizer,
            store,
            publisher,
        }
    }

    /// Handle every line independently; one bad line never stops the rest.
    /// A stats snapshot is broadcast once if anything was accepted.
    pub fn process(&self, batch: Vec<RawLine>) -> BatchReport {
        let mut report = BatchReport {
            size: batch.len(),
            ..BatchReport::default()
        };

        for line in batch {
            let Some(event) = self.normalizer.normalize(&line) else {
                report.rejected += 1;
                continue;
            };
            match self.store.append(&event) {
                Ok(true) => {
                    report.accepted += 1;
                    self.publisher.publish(event);
                }
                Ok(false) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        origin = %event.origin.display(),
                        error = %e,
                        "append failed; event dropped"
                    );
                }
            }
        }

        if report.accepted > 0 {
            self.broadcast_stats();
        }
        self.store.prune_fingerprints(Utc::now());

        tracing::debug!(
            accepted = report.accepted,
            size = report.size,
            duplicates = report.duplicates,
            rejected = report.rejected,
            failed = report.failed,
            "processed {}/{} lines",
            report.accepted,
            report.size
        );
        report
    }

    fn broadcast_stats(&self) {
        match self.store.stats_snapshot(Utc::now()) {
            Ok(snapshot) => self.publisher.publish_stats(snapshot),
            Err(e) => tracing::warn!(error = %e, "cannot compute stats snapshot"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub max_size: usize,
    pub window: Duration,
}

impl From<&DispatchConfig> for BatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_size: config.batch_size.max(1),
            window: config.batch_window(),
        }
    }
}

/// Handle to the running consumer task.
pub struct Dispatcher {
    stop_tx: oneshot::Sender<ShutdownPolicy>,
    task: JoinHandle<()>,
    counters: IngestCounters,
}

impl Dispatcher {
    /// Create the queue and spawn its consumer.
    pub fn spawn(config: &DispatchConfig, processor: BatchProcessor) -> (IngestQueue, Dispatcher) {
        let counters = IngestCounters::new();
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(run(
            rx,
            stop_rx,
            Arc::new(processor),
            BatchSettings::from(config),
            counters.clone(),
        ));
        let queue = IngestQueue {
            tx,
            counters: counters.clone(),
        };
        (
            queue,
            Dispatcher {
                stop_tx,
                task,
                counters,
            },
        )
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Stop the consumer under `policy` and wait for it to exit.
    pub async fn stop(self, policy: ShutdownPolicy) -> CounterSnapshot {
        // Err means the task already exited on its own.
        let _ = self.stop_tx.send(policy);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "dispatcher task ended abnormally");
        }
        self.counters.snapshot()
    }
}

async fn run(
    mut rx: mpsc::Receiver<RawLine>,
    mut stop_rx: oneshot::Receiver<ShutdownPolicy>,
    processor: Arc<BatchProcessor>,
    settings: BatchSettings,
    counters: IngestCounters,
) {
    tracing::info!(
        batch_size = settings.max_size,
        window_ms = settings.window.as_millis() as u64,
        "dispatcher started"
    );

    let policy = loop {
        let first = tokio::select! {
            biased;
            policy = &mut stop_rx => break policy.unwrap_or_default(),
            line = rx.recv() => match line {
                Some(line) => line,
                None => break ShutdownPolicy::Drain,
            },
        };
        let batch = fill_batch(first, &mut rx, settings);
        dispatch(&processor, batch, &counters).await;
    };

    rx.close();
    match policy {
        ShutdownPolicy::Drain => {
            while let Some(first) = rx.recv().await {
                let batch = fill_batch(first, &mut rx, settings);
                dispatch(&processor, batch, &counters).await;
            }
        }
        ShutdownPolicy::Immediate => {
            let mut discarded = 0usize;
            while rx.try_recv().is_ok() {
                discarded += 1;
            }
            IngestCounters::add(&counters.inner.dropped, discarded);
            if discarded > 0 {
                tracing::warn!(discarded, "immediate stop; queued lines discarded");
            }
        }
    }

    let totals = counters.snapshot();
    tracing::info!(
        ?policy,
        accepted = totals.accepted,
        duplicates = totals.duplicates,
        rejected = totals.rejected,
        failed = totals.failed,
        batches = totals.batches,
        "dispatcher stopped"
    );
}

/// Take queued lines after `first` until the batch is full, the queue is
/// momentarily empty, or the window has elapsed.
fn fill_batch(first: RawLine, rx: &mut mpsc::Receiver<RawLine>, settings: BatchSettings) -> Vec<RawLine> {
    let deadline = Instant::now() + settings.window;
    let mut batch = Vec::with_capacity(settings.max_size);
    batch.push(first);
    while batch.len() < settings.max_size && Instant::now() < deadline {
        match rx.try_recv() {
            Ok(line) => batch.push(line),
            Err(_) => break,
        }
    }
    batch
}

async fn dispatch(processor: &Arc<BatchProcessor>, batch: Vec<RawLine>, counters: &IngestCounters) {
    let processor = Arc::clone(processor);
    match tokio::task::spawn_blocking(move || processor.process(batch)).await {
        Ok(report) => counters.record_batch(&report),
        Err(e) => tracing::warn!(error = %e, "batch processing panicked"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
