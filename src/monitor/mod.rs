//! File change monitoring.
//!
//! Clients register watches on single files or on directory trees filtered
//! by a regular expression, then poll a queue of dispatched events.
//!
//! # Architecture
//!
//! ```text
//! FileMonitor
//!   - WatchRegistry (file + pattern watches)
//!       - PathRefCounter (directories to subscribe)
//!   - EventSource (native notify watcher or polling thread)
//!   - EventQueue (bounded FIFO)
//!         |
//!   source thread --RawEvent--> EventMatcher --DispatchedEvent--> EventQueue
//!                                                                    |
//!                                          poll_blocking / poll_non_blocking
//! ```
//!
//! File watches subscribe their parent directory; pattern watches subscribe
//! their root recursively. Any number of watches on the same directory
//! share one subscription.

mod error;
mod facade;
mod matcher;
mod paths;
mod pattern;
mod queue;
mod ref_counter;
mod registry;
pub mod source;
mod types;

pub use error::{MonitorError, MonitorResult};
pub use facade::{DEFAULT_POLL_INTERVAL_MS, FileMonitor, FileMonitorBuilder, MonitorState};
pub use matcher::EventMatcher;
pub use pattern::CompiledPattern;
pub use queue::{DEFAULT_QUEUE_CAPACITY, EventQueue};
pub use ref_counter::{PathRefCounter, TargetDepth, WatchTarget};
pub use registry::{FileWatchEntry, PatternWatchEntry, WatchRegistry};
pub use source::{BackendKind, EventSource, NativeApi, RawEventSink};
pub use types::{DispatchedEvent, EventKind, RawEvent, WatchId, WatchKind};
