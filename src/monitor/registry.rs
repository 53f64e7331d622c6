//! Registry of active watches.
//!
//! Owns every file and pattern watch, keyed by id. File watches are also
//! indexed by path for exact-match lookup; pattern watches are scanned in
//! full for every event. Each insert and removal is paired with exactly one
//! ref-count change on the watch's target directory.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::error::{MonitorError, MonitorResult};
use super::paths;
use super::pattern::CompiledPattern;
use super::ref_counter::{PathRefCounter, TargetDepth, WatchTarget};
use super::types::{IdAllocator, WatchId, WatchKind};

/// Watch on a single regular file.
#[derive(Debug, Clone)]
pub struct FileWatchEntry {
    pub id: WatchId,
    /// Canonical path of the file.
    pub path: PathBuf,
}

impl FileWatchEntry {
    /// Directory subscribed on behalf of this watch.
    pub fn target(&self) -> PathBuf {
        paths::parent_of(&self.path)
    }
}

/// Watch on a directory tree filtered by a pattern.
#[derive(Debug, Clone)]
pub struct PatternWatchEntry {
    pub id: WatchId,
    /// Canonical path of the root directory.
    pub root: PathBuf,
    pub pattern: CompiledPattern,
}

impl PatternWatchEntry {
    pub fn matches(&self, path: &Path) -> bool {
        self.pattern.matches_under(&self.root, path)
    }
}

/// All active watches plus the ref counts of their target directories.
#[derive(Debug)]
pub struct WatchRegistry {
    files: HashMap<WatchId, FileWatchEntry>,
    /// File path -> ids of the file watches on it.
    files_by_path: HashMap<PathBuf, Vec<WatchId>>,
    patterns: HashMap<WatchId, PatternWatchEntry>,
    targets: PathRefCounter,
    file_ids: IdAllocator,
    pattern_ids: IdAllocator,
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            files_by_path: HashMap::new(),
            patterns: HashMap::new(),
            targets: PathRefCounter::new(),
            file_ids: IdAllocator::for_kind(WatchKind::File),
            pattern_ids: IdAllocator::for_kind(WatchKind::Pattern),
        }
    }

    /// Register a watch on an existing regular file.
    ///
    /// The file's parent directory gains one reference.
    pub fn add_file(&mut self, path: &Path) -> MonitorResult<WatchId> {
        let path = paths::resolve_file(path)?;
        let id = self.file_ids.allocate();
        let entry = FileWatchEntry { id, path };

        self.targets.increment(&entry.target(), TargetDepth::Shallow);
        self.files_by_path
            .entry(entry.path.clone())
            .or_default()
            .push(id);
        self.files.insert(id, entry);

        self.debug_check();
        Ok(id)
    }

    /// Register a pattern watch on an existing directory.
    ///
    /// The root directory gains one recursive reference.
    pub fn add_path(&mut self, root: &Path, pattern: &str) -> MonitorResult<WatchId> {
        let root = paths::resolve_dir(root)?;
        let pattern = CompiledPattern::new(pattern)?;
        let id = self.pattern_ids.allocate();

        self.targets.increment(&root, TargetDepth::Recursive);
        self.patterns.insert(id, PatternWatchEntry { id, root, pattern });

        self.debug_check();
        Ok(id)
    }

    /// Remove a watch and release its target reference.
    pub fn remove(&mut self, id: WatchId) -> MonitorResult<()> {
        match id.kind() {
            WatchKind::File => {
                let entry = self
                    .files
                    .remove(&id)
                    .ok_or(MonitorError::UnknownWatch { id })?;
                self.unindex_file(&entry);
                self.targets.decrement(&entry.target(), TargetDepth::Shallow);
            }
            WatchKind::Pattern => {
                let entry = self
                    .patterns
                    .remove(&id)
                    .ok_or(MonitorError::UnknownWatch { id })?;
                self.targets.decrement(&entry.root, TargetDepth::Recursive);
            }
        }

        self.debug_check();
        Ok(())
    }

    fn unindex_file(&mut self, entry: &FileWatchEntry) {
        let Entry::Occupied(mut slot) = self.files_by_path.entry(entry.path.clone()) else {
            panic!(
                "file index out of sync: {} has no entry for watch {}",
                entry.path.display(),
                entry.id
            );
        };

        let ids = slot.get_mut();
        let position = ids
            .iter()
            .position(|id| *id == entry.id)
            .unwrap_or_else(|| panic!("file index out of sync: watch {} not indexed", entry.id));
        ids.swap_remove(position);

        if ids.is_empty() {
            slot.remove();
        }
    }

    /// Ids of the file watches registered on exactly `path`.
    pub fn lookup_by_path(&self, path: &Path) -> &[WatchId] {
        self.files_by_path
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn file_entry(&self, id: WatchId) -> Option<&FileWatchEntry> {
        self.files.get(&id)
    }

    pub fn pattern_entry(&self, id: WatchId) -> Option<&PatternWatchEntry> {
        self.patterns.get(&id)
    }

    /// Every live pattern watch.
    pub fn pattern_entries(&self) -> impl Iterator<Item = &PatternWatchEntry> {
        self.patterns.values()
    }

    pub fn contains(&self, id: WatchId) -> bool {
        match id.kind() {
            WatchKind::File => self.files.contains_key(&id),
            WatchKind::Pattern => self.patterns.contains_key(&id),
        }
    }

    /// Directories the event source must cover, with their depth.
    pub fn targets(&self) -> Vec<WatchTarget> {
        self.targets.targets()
    }

    /// Paths of the directories the event source must cover.
    pub fn current_targets(&self) -> BTreeSet<PathBuf> {
        self.targets.current_targets()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Total number of live watches.
    pub fn len(&self) -> usize {
        self.files.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn debug_check(&self) {
        debug_assert_eq!(
            self.targets.total_weight(),
            self.len(),
            "target ref counts out of sync with registry"
        );
        debug_assert_eq!(
            self.files_by_path.values().map(Vec::len).sum::<usize>(),
            self.files.len(),
            "file path index out of sync with registry"
        );
    }
}
