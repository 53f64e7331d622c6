//! Event sources: turn a set of subscribed directories into raw events.
//!
//! Two implementations share one contract:
//!
//! - [`NativeEventSource`] drives the operating system's notification API
//!   through `notify` (FSEvents, kqueue, ReadDirectoryChangesW or inotify,
//!   see [`NativeApi`]).
//! - [`PollingEventSource`] rescans the targets on a fixed interval and
//!   synthesizes events from modification-time changes.
//!
//! Both own exactly one background thread that invokes the [`RawEventSink`]
//! registered at construction.

mod native;
mod polling;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::MonitorResult;
use super::ref_counter::WatchTarget;
use super::types::RawEvent;

pub use native::NativeEventSource;
pub use polling::PollingEventSource;

/// Receives every raw event, on the source's background thread.
pub type RawEventSink = Arc<dyn Fn(RawEvent) + Send + Sync>;

/// Contract shared by every event source.
pub trait EventSource: Send {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Replace the subscribed set with exactly `targets`.
    ///
    /// An empty set leaves no subscription behind. Errors are environment
    /// faults the caller cannot recover from.
    fn subscribe(&mut self, targets: &[WatchTarget]) -> MonitorResult<()>;

    /// Stop the background thread and release OS resources. Idempotent.
    fn shutdown(&mut self);
}

/// Which family of event source to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The platform's native notification API.
    #[default]
    Native,
    /// Periodic rescans; works anywhere, including network mounts.
    Polling,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native ({})", NativeApi::current()),
            BackendKind::Polling => f.write_str("polling"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(BackendKind::Native),
            "polling" | "poll" => Ok(BackendKind::Polling),
            other => Err(format!("unknown backend '{other}' (expected native or polling)")),
        }
    }
}

/// Native notification API compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeApi {
    /// macOS FSEvents directory event streams.
    DirEvents,
    /// BSD kqueue vnode events.
    KernelQueue,
    /// Windows ReadDirectoryChangesW on an I/O completion port.
    CompletionPort,
    /// Linux inotify.
    Inotify,
    /// No native API; `notify` falls back to polling.
    Unsupported,
}

impl NativeApi {
    pub fn current() -> Self {
        if cfg!(all(target_os = "macos", not(feature = "kqueue"))) {
            NativeApi::DirEvents
        } else if cfg!(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly",
            target_os = "ios"
        )) {
            NativeApi::KernelQueue
        } else if cfg!(target_os = "windows") {
            NativeApi::CompletionPort
        } else if cfg!(any(target_os = "linux", target_os = "android")) {
            NativeApi::Inotify
        } else {
            NativeApi::Unsupported
        }
    }
}

impl fmt::Display for NativeApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeApi::DirEvents => "fsevents",
            NativeApi::KernelQueue => "kqueue",
            NativeApi::CompletionPort => "ReadDirectoryChangesW",
            NativeApi::Inotify => "inotify",
            NativeApi::Unsupported => "poll",
        };
        f.write_str(name)
    }
}

/// Build the event source for `kind`, delivering into `sink`.
pub fn create_source(
    kind: BackendKind,
    poll_interval: Duration,
    sink: RawEventSink,
) -> MonitorResult<Box<dyn EventSource>> {
    let source: Box<dyn EventSource> = match kind {
        BackendKind::Native => Box::new(NativeEventSource::<notify::RecommendedWatcher>::new(sink)?),
        BackendKind::Polling => Box::new(PollingEventSource::new(poll_interval, sink)?),
    };
    Ok(source)
}
