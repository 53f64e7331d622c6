//! Cross-platform file change notification.
//!
//! ```no_run
//! use filemonitor::FileMonitor;
//!
//! let monitor = FileMonitor::new()?;
//! let id = monitor.add_path_watch("/var/photos", r".*\.jpg")?;
//! while let Some(event) = monitor.poll_blocking() {
//!     println!("{event}");
//!     if event.watch_id == id {
//!         // ...
//!     }
//! }
//! # Ok::<(), filemonitor::MonitorError>(())
//! ```

pub mod cli;
pub mod config;
pub mod logging;
pub mod monitor;

pub use config::{LoggingConfig, MonitorConfig, Settings};
pub use monitor::{
    BackendKind, DispatchedEvent, EventKind, FileMonitor, FileMonitorBuilder, MonitorError,
    MonitorResult, MonitorState, WatchId,
};
