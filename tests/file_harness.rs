#![allow(unused)]
//! File watcher integration harness.
//!
//! # What this covers
//!
//! - **Initial read**: lines already present when the watcher starts are
//!   delivered before `start` returns, in file order.
//! - **Live tailing**: appended lines arrive once each, in order.
//! - **Rotation**: rename-and-recreate and in-place truncation both restart
//!   the cursor at offset 0 without re-emitting pre-rotation lines.
//! - **Discovery**: files created after start, including inside new
//!   subdirectories, are picked up; non-log files are ignored.
//! - **Partial lines**: a line is only emitted once its newline arrives.
//!
//! # What this does NOT cover
//!
//! - Network filesystems (undefined notification behaviour)
//! - copytruncate races where the file regrows past the old offset before
//!   the truncation is observed
//!
//! # Running
//!
//! ```sh
//! cargo test --test file_harness
//! ```

mod common;
use common::*;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use unilog_core::{RawLine, Source};
use unilog_feeds::FileWatcher;

const SETTLE: Duration = Duration::from_secs(5);

async fn start(env: &TestEnv) -> (FileWatcher, mpsc::Receiver<RawLine>) {
    let (tx, rx) = mpsc::channel(1024);
    let watcher = FileWatcher::start(env.config().sources, tx)
        .await
        .expect("watcher starts");
    (watcher, rx)
}

/// Receive lines until `n` have arrived or the settle timeout passes.
async fn collect(rx: &mut mpsc::Receiver<RawLine>, n: usize) -> Vec<RawLine> {
    let mut lines = Vec::new();
    let deadline = tokio::time::Instant::now() + SETTLE;
    while lines.len() < n {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(line)) => lines.push(line),
            _ => break,
        }
    }
    lines
}

/// Whatever arrives within a short quiet period.
async fn quiet(rx: &mut mpsc::Receiver<RawLine>) -> Vec<RawLine> {
    let mut lines = Vec::new();
    while let Ok(Some(line)) = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
        lines.push(line);
    }
    lines
}

fn contents(lines: &[RawLine]) -> Vec<&str> {
    lines.iter().map(|l| l.content.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Initial read
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn existing_lines_are_read_before_start_returns() {
    let env = TestEnv::new();
    let path = env.append(Source::Primary, "app.log", &["one", "two"]);
    env.append(Source::Secondary, "nested/deeper/svc.log", &["three"]);

    let (watcher, mut rx) = start(&env).await;
    let report = watcher.initial_report();
    assert_eq!(report.files, 2);
    assert_eq!(report.lines, 3);
    assert_eq!(report.dropped, 0);

    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    assert_eq!(lines.len(), 3);
    let from_app: Vec<&str> = lines
        .iter()
        .filter(|l| l.source_file == path)
        .map(|l| l.content.as_str())
        .collect();
    assert_eq!(from_app, vec!["one", "two"]);
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_roots_start_cleanly() {
    let env = TestEnv::new();
    let (watcher, mut rx) = start(&env).await;
    assert_eq!(watcher.initial_report().files, 0);
    assert!(rx.try_recv().is_err());
    watcher.stop().await;
}

// ---------------------------------------------------------------------------
// Live tailing
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn appended_lines_arrive_once_in_order() {
    let env = TestEnv::new();
    let path = env.append(Source::Primary, "app.log", &["before"]);
    let (watcher, mut rx) = start(&env).await;
    assert_eq!(contents(&collect(&mut rx, 1).await), vec!["before"]);

    append_lines(&path, &["a", "b"]);
    append_lines(&path, &["c"]);
    let lines = collect(&mut rx, 3).await;
    assert_eq!(contents(&lines), vec!["a", "b", "c"]);
    assert!(lines.iter().all(|l| l.source_file == path));
    assert!(quiet(&mut rx).await.is_empty());
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_line_waits_for_newline() {
    use std::io::Write;

    let env = TestEnv::new();
    let path = env.append(Source::Primary, "app.log", &[]);
    let (watcher, mut rx) = start(&env).await;

    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    write!(file, "half").unwrap();
    file.flush().unwrap();
    assert!(quiet(&mut rx).await.is_empty());

    writeln!(file, " and half").unwrap();
    file.flush().unwrap();
    assert_eq!(contents(&collect(&mut rx, 1).await), vec!["half and half"]);
    watcher.stop().await;
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rename_rotation_follows_new_file() {
    let env = TestEnv::new();
    let path = env.append(Source::Secondary, "app.log", &["old 1", "old 2"]);
    let (watcher, mut rx) = start(&env).await;
    assert_eq!(collect(&mut rx, 2).await.len(), 2);

    std::fs::rename(&path, env.secondary.join("app.log.1")).unwrap();
    append_lines(&path, &["new 1"]);
    let lines = collect(&mut rx, 1).await;
    assert_eq!(contents(&lines), vec!["new 1"]);
    assert!(quiet(&mut rx).await.is_empty(), "pre-rotation lines re-emitted");
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn truncation_restarts_at_offset_zero() {
    let env = TestEnv::new();
    let path = env.append(Source::Primary, "app.log", &["a long first line", "another long line"]);
    let (watcher, mut rx) = start(&env).await;
    assert_eq!(collect(&mut rx, 2).await.len(), 2);

    std::fs::write(&path, "short\n").unwrap();
    let lines = collect(&mut rx, 1).await;
    assert_eq!(contents(&lines), vec!["short"]);
    assert!(quiet(&mut rx).await.is_empty());
    watcher.stop().await;
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_files_are_discovered() {
    let env = TestEnv::new();
    let (watcher, mut rx) = start(&env).await;

    let created = env.append(Source::Primary, "later.log", &["fresh"]);
    let lines = collect(&mut rx, 1).await;
    assert_eq!(contents(&lines), vec!["fresh"]);
    assert_eq!(lines[0].source_file, created);
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_subdirectories_are_followed() {
    let env = TestEnv::new();
    let (watcher, mut rx) = start(&env).await;

    env.append(Source::Secondary, "errors/2025/error.log", &["deep"]);
    assert_eq!(contents(&collect(&mut rx, 1).await), vec!["deep"]);
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_log_files_are_ignored() {
    let env = TestEnv::new();
    env.append(Source::Primary, "notes.txt", &["ignored at start"]);
    let (watcher, mut rx) = start(&env).await;
    assert_eq!(watcher.initial_report().files, 0);

    env.append(Source::Primary, "notes.txt", &["ignored live"]);
    env.append(Source::Primary, "app.log", &["kept"]);
    let lines = collect(&mut rx, 1).await;
    assert_eq!(contents(&lines), vec!["kept"]);
    assert!(quiet(&mut rx).await.is_empty());
    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_ends_delivery() {
    let env = TestEnv::new();
    let path = env.append(Source::Primary, "app.log", &[]);
    let (watcher, mut rx) = start(&env).await;
    watcher.stop().await;

    append_lines(&path, &["after stop"]);
    // The worker owned the only sender, so the channel closes.
    assert!(tokio::time::timeout(SETTLE, rx.recv()).await.unwrap().is_none());
}
