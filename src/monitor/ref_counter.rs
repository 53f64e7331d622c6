//! Reference counts for the directories the event source subscribes to.
//!
//! Platform watch APIs subscribe at directory granularity, so every watch
//! contributes one reference to a directory: the parent of a watched file,
//! or the root of a pattern watch. A directory stays subscribed while its
//! count is above zero.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// How deep a target must be watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetDepth {
    /// Only direct children (parent directories of file watches).
    Shallow,
    /// The whole subtree (roots of pattern watches).
    Recursive,
}

/// A directory the event source must cover.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub recursive: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct TargetCount {
    total: usize,
    /// References that need the subtree.
    recursive: usize,
}

/// Per-path reference counts.
///
/// Invariant: a path is present in the map iff its count is above zero, so
/// the number of entries always equals the number of subscribed targets.
#[derive(Debug, Default)]
pub struct PathRefCounter {
    counts: BTreeMap<PathBuf, TargetCount>,
}

impl PathRefCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reference to `path`.
    pub fn increment(&mut self, path: &Path, depth: TargetDepth) {
        let count = self.counts.entry(path.to_path_buf()).or_default();
        count.total += 1;
        if depth == TargetDepth::Recursive {
            count.recursive += 1;
        }
    }

    /// Drop one reference to `path`, forgetting the path at zero.
    ///
    /// # Panics
    /// If `path` holds no reference of the given depth. Every decrement must
    /// pair with an earlier increment.
    pub fn decrement(&mut self, path: &Path, depth: TargetDepth) {
        let count = self
            .counts
            .get_mut(path)
            .unwrap_or_else(|| panic!("ref count underflow: {} is not a target", path.display()));

        if depth == TargetDepth::Recursive {
            assert!(
                count.recursive > 0,
                "ref count underflow: {} has no recursive reference",
                path.display()
            );
            count.recursive -= 1;
        }
        count.total -= 1;

        if count.total == 0 {
            self.counts.remove(path);
        }
    }

    /// Snapshot of the subscribed paths.
    pub fn current_targets(&self) -> BTreeSet<PathBuf> {
        self.counts.keys().cloned().collect()
    }

    /// The subscription set: each path with the depth it must be watched at.
    ///
    /// Paths below a recursive target are already covered by it and are
    /// left out. Watching them separately would let a shallow watch on a
    /// subdirectory replace the recursive one the backend keeps for it.
    pub fn targets(&self) -> Vec<WatchTarget> {
        let recursive_roots: BTreeSet<&Path> = self
            .counts
            .iter()
            .filter(|(_, count)| count.recursive > 0)
            .map(|(path, _)| path.as_path())
            .collect();

        self.counts
            .iter()
            .filter(|(path, _)| {
                !path
                    .ancestors()
                    .skip(1)
                    .any(|ancestor| recursive_roots.contains(ancestor))
            })
            .map(|(path, count)| WatchTarget {
                path: path.clone(),
                recursive: count.recursive > 0,
            })
            .collect()
    }

    /// Current count for `path` (zero when absent).
    pub fn count(&self, path: &Path) -> usize {
        self.counts.get(path).map_or(0, |c| c.total)
    }

    /// Sum of all counts. Equals the number of live watches.
    pub fn total_weight(&self) -> usize {
        self.counts.values().map(|c| c.total).sum()
    }

    /// Number of distinct subscribed paths.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
