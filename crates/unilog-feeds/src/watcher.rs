//! Live file watching.
//!
//! ```text
//! ┌────────────────────┐  blocking_send  ┌──────────────┐  read_new_lines  ┌──────────┐
//! │ RecommendedWatcher │ ──────────────► │ mpsc buffer  │ ───────────────► │ LineSink │
//! │ (notify thread)    │                 │ (tokio task) │     (Tailer)     │          │
//! └────────────────────┘                 └──────────────┘                  └──────────┘
//! ```
//!
//! The notify watcher is registered before the initial read so that writes
//! racing the read are queued rather than lost. Those queued notifications
//! then find the cursor already advanced and emit nothing twice.
//!
//! A full sink makes the reader wait: the cursor has already moved past the
//! lines being handed over, so giving up on them would lose them for good.

use crate::error::WatchError;
use crate::tail::{discover, Tailer};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use unilog_core::config::SourcesConfig;
use unilog_core::RawLine;

/// Capacity of the buffer between the notify thread and the reader task.
const NOTIFY_BUFFER: usize = 1024;

/// How long after a directory appears it is walked a second time.
const RESCAN_DELAY: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// LineSink
// ---------------------------------------------------------------------------

/// Where the watcher hands each line. `submit` waits while the sink is
/// full and resolves to `false` only once the sink can never take the line.
pub trait LineSink: Send + Sync + 'static {
    fn submit(&self, line: RawLine) -> impl Future<Output = bool> + Send;
}

impl LineSink for mpsc::Sender<RawLine> {
    async fn submit(&self, line: RawLine) -> bool {
        self.send(line).await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// FileWatcher
// ---------------------------------------------------------------------------

/// Totals from the initial read of every eligible file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub files: usize,
    pub lines: usize,
    pub dropped: usize,
}

pub struct FileWatcher {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    initial: ScanReport,
}

impl FileWatcher {
    /// Read every eligible file under both roots from its start, then keep
    /// following them. Returns once the initial read is complete; live
    /// notifications are handled on a background task from then on.
    pub async fn start<S: LineSink>(sources: SourcesConfig, sink: S) -> Result<Self, WatchError> {
        let roots = sources.roots();
        for root in &roots {
            if !root.path.is_dir() {
                return Err(WatchError::MissingRoot {
                    path: root.path.clone(),
                });
            }
        }

        let (tx, rx) = mpsc::channel(NOTIFY_BUFFER);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Runs on notify's own thread; a closed receiver means we are stopping.
            let _ = tx.blocking_send(res);
        })
        .map_err(WatchError::Init)?;

        let mode = if sources.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        for root in &roots {
            watcher
                .watch(&root.path, mode)
                .map_err(|source| WatchError::Subscribe {
                    path: root.path.clone(),
                    source,
                })?;
        }

        let cancel = CancellationToken::new();
        let mut worker = Worker {
            sources,
            tailer: Tailer::new(),
            sink,
            cancel: cancel.clone(),
            rescans: VecDeque::new(),
        };
        let mut initial = ScanReport::default();
        for root in &roots {
            let files = match discover(&root.path, worker.sources.recursive, |p| {
                worker.sources.is_log_file(p)
            })
            .await
            {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(root = %root.path.display(), error = %e, "cannot list watched root");
                    continue;
                }
            };
            for file in files {
                let (lines, dropped) = worker.read(&file).await;
                initial.files += 1;
                initial.lines += lines;
                initial.dropped += dropped;
            }
        }
        tracing::info!(
            files = initial.files,
            lines = initial.lines,
            dropped = initial.dropped,
            "initial read complete"
        );

        let task = tokio::spawn(worker.run(rx, watcher));
        Ok(Self {
            cancel,
            task,
            initial,
        })
    }

    pub fn initial_report(&self) -> ScanReport {
        self.initial
    }

    /// Stop following files. Lines already handed to the sink stay there.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "file watcher task ended abnormally");
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker<S> {
    sources: SourcesConfig,
    tailer: Tailer,
    sink: S,
    cancel: CancellationToken,
    /// New directories due for a second walk, oldest first.
    rescans: VecDeque<(Instant, PathBuf)>,
}

impl<S: LineSink> Worker<S> {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<notify::Result<notify::Event>>,
        _watcher: RecommendedWatcher,
    ) {
        let cancel = self.cancel.clone();
        loop {
            let next_rescan = self.rescans.front().map(|(at, _)| *at);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(next_rescan) => {
                    if let Some((_, dir)) = self.rescans.pop_front() {
                        self.read_tree(&dir).await;
                    }
                }
                message = events.recv() => match message {
                    Some(Ok(event)) => self.handle(event).await,
                    Some(Err(e)) => tracing::warn!(error = %e, "filesystem watcher error"),
                    None => break,
                },
            }
        }
        tracing::debug!(tracked = self.tailer.tracked_files(), "file watcher stopped");
    }

    async fn handle(&mut self, event: notify::Event) {
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }
        for path in event.paths {
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => {
                    // Files may land in a new directory before its watch
                    // exists: walk it now and once more after a short delay.
                    if self.sources.recursive && event.kind.is_create() {
                        self.read_tree(&path).await;
                        self.rescans.push_back((Instant::now() + RESCAN_DELAY, path));
                    }
                }
                Ok(_) if self.sources.is_log_file(&path) => {
                    self.read(&path).await;
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if self.tailer.forget(&path) {
                        tracing::debug!(path = %path.display(), "file removed; cursor dropped");
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot stat watched path");
                }
            }
        }
    }

    async fn read_tree(&mut self, dir: &Path) {
        let sources = &self.sources;
        let files = match discover(dir, true, |p| sources.is_log_file(p)).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list new directory");
                return;
            }
        };
        for file in files {
            self.read(&file).await;
        }
    }

    /// Submit every new complete line of one file, waiting for the sink as
    /// needed. Returns `(submitted, dropped)`; lines are only dropped when
    /// the sink closes or the watcher is stopping.
    async fn read(&mut self, path: &Path) -> (usize, usize) {
        let (mut submitted, mut dropped) = (0, 0);
        loop {
            let lines = match self.tailer.read_new_lines(path).await {
                Ok(lines) if lines.is_empty() => break,
                Ok(lines) => lines,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    self.tailer.forget(path);
                    break;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read log file");
                    break;
                }
            };

            let total = lines.len();
            let mut sent = 0;
            for line in lines {
                let accepted = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => false,
                    accepted = self.sink.submit(line) => accepted,
                };
                if !accepted {
                    break;
                }
                sent += 1;
            }
            tracing::trace!(path = %path.display(), lines = total, "read new lines");
            submitted += sent;
            if sent < total {
                dropped += total - sent;
                tracing::warn!(
                    path = %path.display(),
                    dropped = total - sent,
                    "line sink closed; lines dropped"
                );
                break;
            }
        }
        (submitted, dropped)
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
