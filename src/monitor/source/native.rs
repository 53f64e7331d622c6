//! Native event source backed by `notify`.
//!
//! Each subscription is a fresh `notify` watcher. Its callback classifies
//! events into [`RawEvent`]s and hands them to a dispatch thread owned by
//! this source, which feeds the sink until shutdown.

use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use notify::event::{EventKind as NotifyKind, MetadataKind, ModifyKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use super::{EventSource, NativeApi, RawEventSink};
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::monitor::ref_counter::WatchTarget;
use crate::monitor::types::{EventKind, RawEvent};

/// Event source driving the platform notification API.
///
/// Generic over the `notify` watcher so a specific API can be forced;
/// defaults to the platform's recommended one.
pub struct NativeEventSource<W = RecommendedWatcher> {
    /// Live subscription, `None` while no targets are watched.
    watcher: Option<W>,
    /// Cloned into every watcher callback.
    raw_tx: Sender<RawEvent>,
    /// Dropping this stops the dispatch thread.
    shutdown_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<W: Watcher + Send + 'static> NativeEventSource<W> {
    /// Start the dispatch thread. No subscription exists until
    /// [`EventSource::subscribe`] is called with targets.
    pub fn new(sink: RawEventSink) -> MonitorResult<Self> {
        let (raw_tx, raw_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let worker = thread::Builder::new()
            .name("filemonitor-native".to_string())
            .spawn(move || dispatch_loop(raw_rx, shutdown_rx, sink))
            .map_err(|e| MonitorError::backend(format!("failed to spawn dispatch thread: {e}")))?;

        Ok(Self {
            watcher: None,
            raw_tx,
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    fn start(&mut self, targets: &[WatchTarget]) -> MonitorResult<()> {
        let tx = self.raw_tx.clone();
        let mut watcher = W::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for raw in classify(event) {
                        let _ = tx.send(raw);
                    }
                }
                Err(e) => {
                    tracing::warn!("[native] file watch error: {e}");
                }
            },
            notify::Config::default(),
        )?;

        let mut watched = 0;
        for target in targets {
            let mode = if target.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };

            match watcher.watch(&target.path, mode) {
                Ok(()) => {
                    watched += 1;
                    crate::debug_event!("native", "watching", "{}", target.path.display());
                }
                Err(e) => {
                    // Keep the rest of the subscription alive
                    tracing::warn!("[native] failed to watch {}: {e}", target.path.display());
                }
            }
        }

        crate::debug_event!(
            "native",
            "subscribed",
            "{watched}/{} targets via {}",
            targets.len(),
            NativeApi::current()
        );
        self.watcher = Some(watcher);
        Ok(())
    }
}

impl<W> NativeEventSource<W> {
    fn stop(&mut self) {
        // Dropping the watcher tears down the OS subscription
        if self.watcher.take().is_some() {
            crate::debug_event!("native", "subscription stopped");
        }
    }

    fn close(&mut self) {
        self.stop();
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            drop(shutdown_tx);
            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    tracing::error!("[native] dispatch thread panicked");
                }
            }
        }
    }
}

impl<W: Watcher + Send + 'static> EventSource for NativeEventSource<W> {
    fn name(&self) -> &'static str {
        "native"
    }

    fn subscribe(&mut self, targets: &[WatchTarget]) -> MonitorResult<()> {
        if self.shutdown_tx.is_none() {
            return Err(MonitorError::backend("native event source is shut down"));
        }

        self.stop();
        if targets.is_empty() {
            return Ok(());
        }
        self.start(targets)
    }

    fn shutdown(&mut self) {
        self.close();
    }
}

impl<W> Drop for NativeEventSource<W> {
    fn drop(&mut self) {
        self.close();
    }
}

fn dispatch_loop(raw_rx: Receiver<RawEvent>, shutdown_rx: Receiver<()>, sink: RawEventSink) {
    loop {
        crossbeam_channel::select! {
            recv(raw_rx) -> msg => match msg {
                Ok(raw) => sink(raw),
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    }
    crate::debug_event!("native", "dispatch thread exited");
}

/// Translate one `notify` event into raw events, one per path.
///
/// Renames are classified by whether the path still exists right now, which
/// can misreport under concurrent activity on the same path. `Both` renames
/// are skipped because the backends that emit them also emit the separate
/// `From` and `To` halves.
pub(crate) fn classify(event: Event) -> Vec<RawEvent> {
    if event.need_rescan() {
        // Coalesced "something changed below here"; no diff fallback
        crate::debug_event!("native", "rescan requested, events dropped", "{:?}", event.paths);
        return Vec::new();
    }

    let kind = match event.kind {
        NotifyKind::Create(_) => Some(EventKind::Added),
        NotifyKind::Remove(_) => Some(EventKind::Removed),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) => return Vec::new(),
        NotifyKind::Modify(ModifyKind::Name(_)) => None,
        NotifyKind::Modify(
            ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Metadata(MetadataKind::WriteTime),
        ) => Some(EventKind::Modified),
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| {
            let kind = kind.unwrap_or_else(|| rename_kind(&path));
            RawEvent { path, kind }
        })
        .collect()
}

fn rename_kind(path: &Path) -> EventKind {
    if path.exists() {
        EventKind::RenamedNew
    } else {
        EventKind::RenamedOld
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, Flag, RemoveKind};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn event(kind: NotifyKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_classify_basic_kinds() {
        let path = Path::new("/tmp/file.txt");

        let added = classify(event(NotifyKind::Create(CreateKind::File), path));
        assert_eq!(added, vec![RawEvent::new(path, EventKind::Added)]);

        let removed = classify(event(NotifyKind::Remove(RemoveKind::Any), path));
        assert_eq!(removed, vec![RawEvent::new(path, EventKind::Removed)]);

        let modified = classify(event(
            NotifyKind::Modify(ModifyKind::Data(DataChange::Content)),
            path,
        ));
        assert_eq!(modified, vec![RawEvent::new(path, EventKind::Modified)]);

        let write_time = classify(event(
            NotifyKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            path,
        ));
        assert_eq!(write_time[0].kind, EventKind::Modified);
    }

    #[test]
    fn test_classify_ignores_access_and_permissions() {
        let path = Path::new("/tmp/file.txt");
        assert!(classify(event(NotifyKind::Access(AccessKind::Any), path)).is_empty());
        assert!(
            classify(event(
                NotifyKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                path
            ))
            .is_empty()
        );
    }

    #[test]
    fn test_classify_rename_by_existence() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("renamed.txt");
        let missing = temp.path().join("original.txt");
        fs::write(&present, "x").unwrap();

        let new_name = classify(event(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::To)),
            &present,
        ));
        assert_eq!(new_name[0].kind, EventKind::RenamedNew);

        let old_name = classify(event(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &missing,
        ));
        assert_eq!(old_name[0].kind, EventKind::RenamedOld);

        let both = Event::new(NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(missing.clone())
            .add_path(present.clone());
        assert!(classify(both).is_empty());
    }

    #[test]
    fn test_classify_drops_rescan() {
        let rescan = event(NotifyKind::Any, Path::new("/tmp")).set_flag(Flag::Rescan);
        assert!(classify(rescan).is_empty());
    }

    #[test]
    fn test_subscription_delivers_events() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();

        let (tx, rx) = unbounded::<RawEvent>();
        let sink: RawEventSink = Arc::new(move |raw| {
            let _ = tx.send(raw);
        });

        let mut source = NativeEventSource::<RecommendedWatcher>::new(sink).unwrap();
        source
            .subscribe(&[WatchTarget {
                path: root.clone(),
                recursive: false,
            }])
            .unwrap();

        let file: PathBuf = root.join("created.txt");
        fs::write(&file, "hello").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = false;
        while Instant::now() < deadline {
            if let Ok(raw) = rx.recv_timeout(Duration::from_millis(50)) {
                if raw.path == file {
                    seen = true;
                    break;
                }
            }
        }
        assert!(seen, "expected an event for {}", file.display());

        source.subscribe(&[]).unwrap();
        source.shutdown();
        source.shutdown();
        assert!(source.subscribe(&[]).is_err());
    }
}
