//! Polling event source.
//!
//! Keeps a snapshot of every entry below each target (modification time,
//! length, directory flag) and diffs it against a fresh scan on a fixed
//! interval. Works where native notifications don't (network mounts,
//! exotic filesystems) at the cost of latency bounded by the interval.

use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use walkdir::WalkDir;

use super::{EventSource, RawEventSink};
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::monitor::ref_counter::WatchTarget;
use crate::monitor::types::{EventKind, RawEvent};

/// Shortest interval accepted; anything lower is clamped.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// What we remember about a path between scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
    is_dir: bool,
}

impl From<&Metadata> for Stamp {
    fn from(metadata: &Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
            is_dir: metadata.is_dir(),
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    recursive: bool,
    entries: HashMap<PathBuf, Stamp>,
}

/// Target root -> last observed state below it.
type Snapshots = HashMap<PathBuf, Snapshot>;

/// Event source that rescans its targets periodically.
pub struct PollingEventSource {
    snapshots: Arc<Mutex<Snapshots>>,
    interval: Duration,
    /// Dropping this stops the poll thread.
    shutdown_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PollingEventSource {
    /// Start the poll thread. It idles until targets are subscribed.
    pub fn new(interval: Duration, sink: RawEventSink) -> MonitorResult<Self> {
        let interval = interval.max(MIN_INTERVAL);
        let snapshots = Arc::new(Mutex::new(Snapshots::new()));
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let worker = {
            let snapshots = snapshots.clone();
            thread::Builder::new()
                .name("filemonitor-poll".to_string())
                .spawn(move || poll_loop(snapshots, interval, shutdown_rx, sink))
                .map_err(|e| MonitorError::backend(format!("failed to spawn poll thread: {e}")))?
        };

        Ok(Self {
            snapshots,
            interval,
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn close(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            drop(shutdown_tx);
            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    tracing::error!("[poll] poll thread panicked");
                }
            }
        }
        self.snapshots.lock().clear();
    }
}

impl EventSource for PollingEventSource {
    fn name(&self) -> &'static str {
        "polling"
    }

    /// Swap the target table. Retained targets keep their snapshot so
    /// changes since the last scan are still reported; new targets are
    /// baselined here so existing files don't show up as added.
    fn subscribe(&mut self, targets: &[WatchTarget]) -> MonitorResult<()> {
        if self.shutdown_tx.is_none() {
            return Err(MonitorError::backend("polling event source is shut down"));
        }

        let mut snapshots = self.snapshots.lock();
        snapshots.retain(|root, snapshot| {
            targets
                .iter()
                .any(|t| &t.path == root && t.recursive == snapshot.recursive)
        });

        for target in targets {
            snapshots
                .entry(target.path.clone())
                .or_insert_with(|| Snapshot {
                    recursive: target.recursive,
                    entries: scan(&target.path, target.recursive),
                });
        }

        crate::debug_event!(
            "poll",
            "subscribed",
            "{} targets every {:?}",
            snapshots.len(),
            self.interval
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        self.close();
    }
}

impl Drop for PollingEventSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn poll_loop(
    snapshots: Arc<Mutex<Snapshots>>,
    interval: Duration,
    shutdown_rx: Receiver<()>,
    sink: RawEventSink,
) {
    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            // Sender dropped or explicit stop
            _ => break,
        }

        // Snapshot lock is released before the sink runs
        for raw in poll_once(&snapshots) {
            sink(raw);
        }
    }
    crate::debug_event!("poll", "poll thread exited");
}

/// Rescan every target and return what changed, once per path and kind.
fn poll_once(snapshots: &Mutex<Snapshots>) -> Vec<RawEvent> {
    let mut snapshots = snapshots.lock();
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    for (root, snapshot) in snapshots.iter_mut() {
        let current = scan(root, snapshot.recursive);
        for raw in diff(&snapshot.entries, &current) {
            // Overlapping targets report the same path twice
            if seen.insert(raw.clone()) {
                events.push(raw);
            }
        }
        snapshot.entries = current;
    }

    events
}

/// Stamp every entry below `root`: direct children only, or the whole tree.
fn scan(root: &Path, recursive: bool) -> HashMap<PathBuf, Stamp> {
    let max_depth = if recursive { usize::MAX } else { 1 };

    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let stamp = Stamp::from(&entry.metadata().ok()?);
            Some((entry.into_path(), stamp))
        })
        .collect()
}

fn diff(before: &HashMap<PathBuf, Stamp>, after: &HashMap<PathBuf, Stamp>) -> Vec<RawEvent> {
    let mut events = Vec::new();

    for (path, stamp) in after {
        match before.get(path) {
            None => events.push(RawEvent::new(path, EventKind::Added)),
            // Directory mtimes move whenever a child changes; children report themselves
            Some(previous) if !stamp.is_dir && previous != stamp => {
                events.push(RawEvent::new(path, EventKind::Modified));
            }
            Some(_) => {}
        }
    }

    for path in before.keys() {
        if !after.contains_key(path) {
            events.push(RawEvent::new(path, EventKind::Removed));
        }
    }

    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn idle_source() -> PollingEventSource {
        // Long interval so only explicit poll_once calls scan
        let sink: RawEventSink = Arc::new(|_| {});
        PollingEventSource::new(Duration::from_secs(3600), sink).unwrap()
    }

    fn target(path: &Path, recursive: bool) -> WatchTarget {
        WatchTarget {
            path: path.to_path_buf(),
            recursive,
        }
    }

    #[test]
    fn test_diff_reports_changes() {
        let stamp = |len| Stamp {
            modified: None,
            len,
            is_dir: false,
        };
        let before = HashMap::from([
            (PathBuf::from("/t/kept.txt"), stamp(1)),
            (PathBuf::from("/t/changed.txt"), stamp(1)),
            (PathBuf::from("/t/gone.txt"), stamp(1)),
        ]);
        let after = HashMap::from([
            (PathBuf::from("/t/kept.txt"), stamp(1)),
            (PathBuf::from("/t/changed.txt"), stamp(2)),
            (PathBuf::from("/t/new.txt"), stamp(1)),
        ]);

        let events = diff(&before, &after);
        assert_eq!(
            events,
            vec![
                RawEvent::new("/t/changed.txt", EventKind::Modified),
                RawEvent::new("/t/gone.txt", EventKind::Removed),
                RawEvent::new("/t/new.txt", EventKind::Added),
            ]
        );
    }

    #[test]
    fn test_diff_ignores_directory_mtime() {
        let dir = |secs| Stamp {
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
            len: 0,
            is_dir: true,
        };
        let before = HashMap::from([(PathBuf::from("/t/sub"), dir(1))]);
        let after = HashMap::from([(PathBuf::from("/t/sub"), dir(2))]);
        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn test_subscribe_baselines_existing_files() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        fs::write(root.join("existing.txt"), "start").unwrap();

        let mut source = idle_source();
        source.subscribe(&[target(&root, false)]).unwrap();

        // Nothing changed since the baseline
        assert!(poll_once(&source.snapshots).is_empty());

        fs::write(root.join("existing.txt"), "finish").unwrap();
        fs::write(root.join("fresh.txt"), "new").unwrap();
        let events = poll_once(&source.snapshots);
        assert!(events.contains(&RawEvent::new(root.join("existing.txt"), EventKind::Modified)));
        assert!(events.contains(&RawEvent::new(root.join("fresh.txt"), EventKind::Added)));

        fs::remove_file(root.join("existing.txt")).unwrap();
        let events = poll_once(&source.snapshots);
        assert_eq!(
            events,
            vec![RawEvent::new(root.join("existing.txt"), EventKind::Removed)]
        );

        source.shutdown();
    }

    #[test]
    fn test_shallow_target_ignores_subdirectories() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(root.join("sub")).unwrap();

        let mut source = idle_source();
        source.subscribe(&[target(&root, false)]).unwrap();

        fs::write(root.join("sub").join("deep.txt"), "x").unwrap();
        assert!(poll_once(&source.snapshots).is_empty());

        source.subscribe(&[target(&root, true)]).unwrap();
        fs::write(root.join("sub").join("deeper.txt"), "y").unwrap();
        let events = poll_once(&source.snapshots);
        assert_eq!(
            events,
            vec![RawEvent::new(
                root.join("sub").join("deeper.txt"),
                EventKind::Added
            )]
        );
    }

    #[test]
    fn test_overlapping_targets_report_once() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();

        let mut source = idle_source();
        source
            .subscribe(&[target(&root, true), target(&sub, false)])
            .unwrap();

        fs::write(sub.join("a.txt"), "x").unwrap();
        let events = poll_once(&source.snapshots);
        assert_eq!(events, vec![RawEvent::new(sub.join("a.txt"), EventKind::Added)]);
    }

    #[test]
    fn test_unsubscribe_forgets_targets() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();

        let mut source = idle_source();
        source.subscribe(&[target(&root, false)]).unwrap();
        source.subscribe(&[]).unwrap();

        fs::write(root.join("late.txt"), "x").unwrap();
        assert!(poll_once(&source.snapshots).is_empty());

        source.shutdown();
        assert!(source.subscribe(&[]).is_err());
    }

    #[test]
    fn test_poll_thread_delivers_to_sink() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let sink: RawEventSink = Arc::new(move |raw| {
            let _ = tx.send(raw);
        });
        let mut source = PollingEventSource::new(Duration::from_millis(20), sink).unwrap();
        source.subscribe(&[target(&root, false)]).unwrap();

        fs::write(root.join("polled.txt"), "x").unwrap();
        let raw = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(raw, RawEvent::new(root.join("polled.txt"), EventKind::Added));

        source.shutdown();
    }
}
