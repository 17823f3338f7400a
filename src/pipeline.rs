//! Start-up and shut-down ordering for the whole ingestion pipeline.
//!
//! Start: storage directory → `EventStore::initialize` → publisher →
//! dispatcher → file watcher (initial read, then live). The store is seeded
//! before the first line is read, so re-reading old files after a restart
//! yields only duplicates.
//!
//! Stop: the watcher first so nothing new is queued, then the dispatcher
//! under the configured [`ShutdownPolicy`].

use crate::dispatcher::{BatchProcessor, CounterSnapshot, Dispatcher, IngestQueue};
use anyhow::Context;
use std::sync::Arc;
use unilog_core::config::{Config, ShutdownPolicy};
use unilog_core::{EventStore, Normalizer, Publisher, Subscription};
use unilog_feeds::FileWatcher;

pub struct Pipeline {
    store: Arc<EventStore>,
    publisher: Publisher,
    queue: IngestQueue,
    dispatcher: Dispatcher,
    watcher: FileWatcher,
    shutdown: ShutdownPolicy,
}

impl Pipeline {
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let publisher = Publisher::new(config.publisher.channel_capacity);
        Self::start_with_publisher(config, publisher).await
    }

    /// Start with a caller-supplied publisher, so subscriptions made before
    /// start also see events from the initial read.
    pub async fn start_with_publisher(mut config: Config, publisher: Publisher) -> anyhow::Result<Self> {
        // Notification paths are absolute; cursors and source routing must agree with them.
        for root in [&mut config.sources.primary, &mut config.sources.secondary] {
            std::fs::create_dir_all(&*root)
                .with_context(|| format!("creating watched root {}", root.display()))?;
            *root = std::fs::canonicalize(&*root)
                .with_context(|| format!("resolving watched root {}", root.display()))?;
        }

        let store = Arc::new(
            EventStore::from_config(&config.storage).context("opening event store")?,
        );
        let seeding = Arc::clone(&store);
        tokio::task::spawn_blocking(move || seeding.initialize())
            .await
            .context("store initialisation task")?
            .context("initialising event store")?;

        let processor = BatchProcessor::new(
            Normalizer::new(&config.sources),
            Arc::clone(&store),
            publisher.clone(),
        );
        let (queue, dispatcher) = Dispatcher::spawn(&config.dispatch, processor);

        let watcher = match FileWatcher::start(config.sources.clone(), queue.clone()).await {
            Ok(watcher) => watcher,
            Err(e) => {
                dispatcher.stop(ShutdownPolicy::Immediate).await;
                return Err(e).context("starting file watcher");
            }
        };

        tracing::info!(
            primary = %config.sources.primary.display(),
            secondary = %config.sources.secondary.display(),
            storage = %store.base_dir().display(),
            "pipeline started"
        );
        Ok(Self {
            store,
            publisher,
            queue,
            dispatcher,
            watcher,
            shutdown: config.dispatch.shutdown,
        })
    }

    /// Start, ingest everything currently on disk, and stop.
    pub async fn run_once(config: Config) -> anyhow::Result<CounterSnapshot> {
        let pipeline = Self::start(config).await?;
        Ok(pipeline.shutdown_with(ShutdownPolicy::Drain).await)
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn subscribe(&self) -> Subscription {
        self.publisher.subscribe()
    }

    /// Producer handle for lines that do not come from the watched roots.
    pub fn queue(&self) -> &IngestQueue {
        &self.queue
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.dispatcher.counters()
    }

    pub async fn shutdown(self) -> CounterSnapshot {
        let policy = self.shutdown;
        self.shutdown_with(policy).await
    }

    pub async fn shutdown_with(self, policy: ShutdownPolicy) -> CounterSnapshot {
        self.watcher.stop().await;
        let totals = self.dispatcher.stop(policy).await;
        tracing::info!(
            ?policy,
            received = totals.received,
            accepted = totals.accepted,
            dropped = totals.dropped,
            "pipeline stopped"
        );
        totals
    }
}
