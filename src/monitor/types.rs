//! Identifiers and event types shared by the monitor components.

use std::fmt;
use std::num::NonZeroU64;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of a live watch.
///
/// Never zero. The parity encodes the kind of watch: even ids belong to
/// file watches, odd ids to pattern (directory) watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(NonZeroU64);

impl WatchId {
    /// Build an id from its raw value. Returns `None` for zero.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Kind of watch this id was allocated for.
    pub fn kind(self) -> WatchKind {
        if self.get() % 2 == 0 {
            WatchKind::File
        } else {
            WatchKind::Pattern
        }
    }

    pub fn is_file(self) -> bool {
        self.kind() == WatchKind::File
    }

    pub fn is_pattern(self) -> bool {
        self.kind() == WatchKind::Pattern
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of watch the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// A single regular file.
    File,
    /// A directory tree filtered by a regular expression.
    Pattern,
}

/// Allocates watch ids for one kind.
///
/// Steps by two from its starting value, so file and pattern ids never
/// collide and are never reused.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn for_kind(kind: WatchKind) -> Self {
        let next = match kind {
            WatchKind::File => 2,
            WatchKind::Pattern => 1,
        };
        Self { next }
    }

    pub(crate) fn allocate(&mut self) -> WatchId {
        let id = WatchId::from_raw(self.next).expect("watch id counter wrapped to zero");
        self.next += 2;
        id
    }
}

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Removed,
    Modified,
    /// The path was renamed away; it no longer exists under this name.
    RenamedOld,
    /// The path is the destination of a rename.
    RenamedNew,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "ADDED",
            EventKind::Removed => "REMOVED",
            EventKind::Modified => "MODIFIED",
            EventKind::RenamedOld => "RENAMED_OLD",
            EventKind::RenamedNew => "RENAMED_NEW",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change reported by an event source, before it is matched to watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: EventKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A change resolved to one specific watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedEvent {
    pub path: PathBuf,
    pub kind: EventKind,
    pub watch_id: WatchId,
}

impl fmt::Display for DispatchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (watch {})",
            self.kind,
            self.path.display(),
            self.watch_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_not_a_watch_id() {
        assert!(WatchId::from_raw(0).is_none());
        assert_eq!(WatchId::from_raw(7).unwrap().get(), 7);
    }

    #[test]
    fn test_parity_encodes_kind() {
        assert_eq!(WatchId::from_raw(2).unwrap().kind(), WatchKind::File);
        assert_eq!(WatchId::from_raw(3).unwrap().kind(), WatchKind::Pattern);
        assert!(WatchId::from_raw(10).unwrap().is_file());
        assert!(WatchId::from_raw(11).unwrap().is_pattern());
    }

    #[test]
    fn test_allocators_never_collide() {
        let mut files = IdAllocator::for_kind(WatchKind::File);
        let mut patterns = IdAllocator::for_kind(WatchKind::Pattern);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let f = files.allocate();
            let p = patterns.allocate();
            assert!(f.is_file());
            assert!(p.is_pattern());
            assert!(seen.insert(f));
            assert!(seen.insert(p));
        }
    }

    #[test]
    fn test_event_display() {
        let event = DispatchedEvent {
            path: PathBuf::from("/tmp/a.txt"),
            kind: EventKind::RenamedOld,
            watch_id: WatchId::from_raw(4).unwrap(),
        };
        assert_eq!(event.to_string(), "RENAMED_OLD /tmp/a.txt (watch 4)");
    }
}
