//! Public entry point: the file monitor.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::MonitorConfig;

use super::error::{MonitorError, MonitorResult};
use super::matcher::EventMatcher;
use super::queue::{DEFAULT_QUEUE_CAPACITY, EventQueue};
use super::registry::WatchRegistry;
use super::source::{BackendKind, EventSource, RawEventSink, create_source};
use super::types::{DispatchedEvent, RawEvent, WatchId};

/// Default rescan interval of the polling backend.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Lifecycle of a [`FileMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No watches, no OS subscription.
    Empty,
    /// At least one watch, subscription running.
    Active,
    /// Terminal. Every operation fails with [`MonitorError::Closed`].
    ShutDown,
}

/// Watches files and pattern-filtered directory trees.
///
/// Owns one event source and one event queue. Adding or removing a watch
/// rebuilds the source's subscription before returning, so a change made
/// after `add_*` returns is observed, and no event for a removed watch is
/// queued after `remove_watch` returns.
///
/// Dropping the monitor shuts it down.
pub struct FileMonitor {
    shared: Arc<Shared>,
    backend: BackendKind,
}

struct Shared {
    /// Registry and source live under one lock so a resubscription can
    /// never interleave with another mutation or with matching.
    core: Mutex<Core>,
    /// Held from matching until the matched events are queued. Taken after
    /// `core` on both paths.
    delivery: Mutex<()>,
    queue: EventQueue,
}

struct Core {
    registry: WatchRegistry,
    source: Option<Box<dyn EventSource>>,
    closed: bool,
}

impl Shared {
    /// Sink body: match under the registry lock, queue outside it.
    fn deliver(&self, raw: RawEvent) {
        let core = self.core.lock();
        if core.closed {
            return;
        }

        let dispatched = EventMatcher::new(&core.registry).resolve(&raw);
        if dispatched.is_empty() {
            tracing::trace!("[monitor] unmatched {} {}", raw.kind, raw.path.display());
            return;
        }

        let _delivery = self.delivery.lock();
        drop(core);

        for event in dispatched {
            self.queue.push(event);
        }
    }

    /// Mark closed and release waiters. The caller shuts the returned
    /// source down after dropping the `core` lock, since its thread may be
    /// waiting on that lock.
    fn close(&self, core: &mut Core) -> Option<Box<dyn EventSource>> {
        core.closed = true;
        self.queue.shutdown();
        core.source.take()
    }
}

impl FileMonitor {
    /// Create a builder for configuring the monitor.
    pub fn builder() -> FileMonitorBuilder {
        FileMonitorBuilder::new()
    }

    /// Monitor on the native backend with default settings.
    pub fn new() -> MonitorResult<Self> {
        Self::builder().build()
    }

    /// Monitor configured from the `[monitor]` settings table.
    pub fn from_config(config: &MonitorConfig) -> MonitorResult<Self> {
        Self::builder()
            .backend(config.backend)
            .poll_interval_ms(config.poll_interval_ms)
            .queue_capacity(config.max_pending_events)
            .build()
    }

    /// Watch a single existing regular file.
    pub fn add_file_watch(&self, path: impl AsRef<Path>) -> MonitorResult<WatchId> {
        let path = path.as_ref();
        let id = self.mutate(|registry| registry.add_file(path))?;
        crate::log_event!("monitor", "watching file", "{} as {id}", path.display());
        Ok(id)
    }

    /// Watch every path below `root` whose root-relative form matches
    /// `pattern` (a regular expression anchored at both ends).
    pub fn add_path_watch(&self, root: impl AsRef<Path>, pattern: &str) -> MonitorResult<WatchId> {
        let root = root.as_ref();
        let id = self.mutate(|registry| registry.add_path(root, pattern))?;
        crate::log_event!(
            "monitor",
            "watching path",
            "{} matching '{pattern}' as {id}",
            root.display()
        );
        Ok(id)
    }

    /// Stop a watch. No event bearing `id` is queued after this returns.
    pub fn remove_watch(&self, id: WatchId) -> MonitorResult<()> {
        self.mutate(|registry| registry.remove(id))?;
        crate::log_event!("monitor", "removed watch", "{id}");
        Ok(())
    }

    /// Block until an event arrives. `None` once the monitor is shut down.
    pub fn poll_blocking(&self) -> Option<DispatchedEvent> {
        self.shared.queue.pop_blocking()
    }

    /// Next pending event, without blocking.
    pub fn poll_non_blocking(&self) -> Option<DispatchedEvent> {
        self.shared.queue.pop_non_blocking()
    }

    /// Wait at most `timeout` for an event.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<DispatchedEvent> {
        self.shared.queue.pop_timeout(timeout)
    }

    /// Blocking iterator over events; ends when the monitor shuts down.
    pub fn events(&self) -> impl Iterator<Item = DispatchedEvent> + '_ {
        std::iter::from_fn(move || self.poll_blocking())
    }

    /// Tear down the event source and release every blocked poller.
    /// Idempotent.
    pub fn shutdown(&self) {
        let source = {
            let mut core = self.shared.core.lock();
            if core.closed {
                return;
            }
            self.shared.close(&mut core)
        };

        if let Some(mut source) = source {
            source.shutdown();
        }
        crate::log_event!("monitor", "shut down");
    }

    pub fn state(&self) -> MonitorState {
        let core = self.shared.core.lock();
        if core.closed {
            MonitorState::ShutDown
        } else if core.registry.is_empty() {
            MonitorState::Empty
        } else {
            MonitorState::Active
        }
    }

    /// Number of live watches.
    pub fn watch_count(&self) -> usize {
        self.shared.core.lock().registry.len()
    }

    /// Directories currently subscribed at the OS level.
    pub fn targets(&self) -> BTreeSet<PathBuf> {
        self.shared.core.lock().registry.current_targets()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Events waiting to be polled.
    pub fn pending_events(&self) -> usize {
        self.shared.queue.len()
    }

    /// Events discarded because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.shared.queue.dropped()
    }

    /// Apply a registry mutation and resubscribe, all under the core lock.
    ///
    /// A failed resubscription shuts the monitor down: the source could not
    /// be rebuilt and will not be retried.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut WatchRegistry) -> MonitorResult<T>,
    ) -> MonitorResult<T> {
        let mut core = self.shared.core.lock();
        if core.closed {
            return Err(MonitorError::Closed);
        }

        let value = op(&mut core.registry)?;

        let targets = core.registry.targets();
        let result = match core.source.as_mut() {
            Some(source) => source.subscribe(&targets),
            None => Err(MonitorError::Closed),
        };

        if let Err(e) = result {
            tracing::error!("[monitor] event source failed, shutting down: {e}");
            let source = self.shared.close(&mut core);
            drop(core);
            if let Some(mut source) = source {
                source.shutdown();
            }
            return Err(e);
        }

        crate::debug_event!("monitor", "subscribed", "{} targets", targets.len());

        // Let deliveries matched before this mutation finish queueing
        let _delivery = self.shared.delivery.lock();
        Ok(value)
    }
}

impl Drop for FileMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for constructing a [`FileMonitor`].
#[derive(Debug, Clone)]
pub struct FileMonitorBuilder {
    backend: BackendKind,
    poll_interval: Duration,
    queue_capacity: usize,
}

impl FileMonitorBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            backend: BackendKind::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Select the event source.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the polling backend's rescan interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the polling backend's rescan interval in milliseconds.
    pub fn poll_interval_ms(self, ms: u64) -> Self {
        self.poll_interval(Duration::from_millis(ms))
    }

    /// Maximum pending events before the oldest are evicted.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Build the monitor and start its event source thread.
    pub fn build(self) -> MonitorResult<FileMonitor> {
        let shared = Arc::new(Shared {
            core: Mutex::new(Core {
                registry: WatchRegistry::new(),
                source: None,
                closed: false,
            }),
            delivery: Mutex::new(()),
            queue: EventQueue::with_capacity(self.queue_capacity),
        });

        // Weak so the source thread never keeps the monitor alive
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let sink: RawEventSink = Arc::new(move |raw| {
            if let Some(shared) = weak.upgrade() {
                shared.deliver(raw);
            }
        });

        let source = create_source(self.backend, self.poll_interval, sink)?;
        crate::debug_event!("monitor", "started", "{} backend", source.name());
        shared.core.lock().source = Some(source);

        Ok(FileMonitor {
            shared,
            backend: self.backend,
        })
    }
}

impl Default for FileMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::EventKind;
    use std::fs;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    fn polling_monitor() -> FileMonitor {
        FileMonitor::builder()
            .backend(BackendKind::Polling)
            .poll_interval_ms(20)
            .build()
            .unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let monitor = polling_monitor();
        assert_eq!(monitor.state(), MonitorState::Empty);

        let id = monitor.add_file_watch(&file).unwrap();
        assert_eq!(monitor.state(), MonitorState::Active);
        assert_eq!(monitor.watch_count(), 1);

        monitor.remove_watch(id).unwrap();
        assert_eq!(monitor.state(), MonitorState::Empty);
        assert!(monitor.targets().is_empty());

        monitor.shutdown();
        assert_eq!(monitor.state(), MonitorState::ShutDown);
    }

    #[test]
    fn test_operations_after_shutdown_are_closed() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let monitor = polling_monitor();
        let id = monitor.add_file_watch(&file).unwrap();
        monitor.shutdown();
        monitor.shutdown();

        assert!(matches!(monitor.add_file_watch(&file), Err(MonitorError::Closed)));
        assert!(matches!(
            monitor.add_path_watch(temp.path(), ".*"),
            Err(MonitorError::Closed)
        ));
        assert!(matches!(monitor.remove_watch(id), Err(MonitorError::Closed)));
        assert!(monitor.poll_non_blocking().is_none());
        assert!(monitor.poll_blocking().is_none());
    }

    #[test]
    fn test_validation_errors_leave_state_untouched() {
        let temp = TempDir::new().unwrap();
        let monitor = polling_monitor();

        assert!(matches!(
            monitor.add_file_watch(temp.path()),
            Err(MonitorError::InvalidTarget { .. })
        ));
        assert!(matches!(
            monitor.add_path_watch(temp.path(), "("),
            Err(MonitorError::InvalidPattern { .. })
        ));
        assert!(matches!(
            monitor.remove_watch(WatchId::from_raw(8).unwrap()),
            Err(MonitorError::UnknownWatch { .. })
        ));
        assert_eq!(monitor.state(), MonitorState::Empty);
    }

    #[test]
    fn test_polling_monitor_delivers_modification() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("basictest.txt");
        fs::write(&file, "start").unwrap();

        let monitor = polling_monitor();
        let id = monitor.add_file_watch(&file).unwrap();
        fs::write(&file, "finish").unwrap();

        let event = monitor
            .poll_timeout(Duration::from_secs(2))
            .expect("modification should be reported");
        assert_eq!(event.watch_id, id);
        assert_eq!(event.kind, EventKind::Modified);
    }

    #[test]
    fn test_drop_releases_blocked_poller() {
        let monitor = Arc::new(polling_monitor());
        let poller = {
            let monitor = monitor.clone();
            thread::spawn(move || monitor.poll_blocking())
        };

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        monitor.shutdown();

        assert!(poller.join().unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
