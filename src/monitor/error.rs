//! Error types for the file monitor.

use std::path::PathBuf;
use thiserror::Error;

use super::types::WatchId;

/// Errors from monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Cannot watch {path}: {reason}")]
    InvalidTarget { path: PathBuf, reason: String },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("No watch with id {id}")]
    UnknownWatch { id: WatchId },

    #[error("File monitor is shut down")]
    Closed,

    #[error("Event source failed: {reason}")]
    BackendFault { reason: String },
}

impl MonitorError {
    pub(crate) fn invalid_target(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        MonitorError::InvalidTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn backend(reason: impl Into<String>) -> Self {
        MonitorError::BackendFault {
            reason: reason.into(),
        }
    }
}

impl From<notify::Error> for MonitorError {
    fn from(e: notify::Error) -> Self {
        MonitorError::BackendFault {
            reason: e.to_string(),
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
