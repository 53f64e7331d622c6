//! Resolves raw events to the watches that care about them.

use super::registry::WatchRegistry;
use super::types::{DispatchedEvent, RawEvent};

/// Matches raw events against a registry snapshot.
///
/// Two passes, both always run: an exact lookup of the path among file
/// watches, then a test against every pattern watch. Pattern cost grows
/// with the number of pattern watches, which is expected to stay small.
pub struct EventMatcher<'a> {
    registry: &'a WatchRegistry,
}

impl<'a> EventMatcher<'a> {
    pub fn new(registry: &'a WatchRegistry) -> Self {
        Self { registry }
    }

    /// One dispatched event per matching watch.
    pub fn resolve(&self, raw: &RawEvent) -> Vec<DispatchedEvent> {
        let mut dispatched = Vec::new();

        for id in self.registry.lookup_by_path(&raw.path) {
            dispatched.push(DispatchedEvent {
                path: raw.path.clone(),
                kind: raw.kind,
                watch_id: *id,
            });
        }

        for entry in self.registry.pattern_entries() {
            if entry.matches(&raw.path) {
                dispatched.push(DispatchedEvent {
                    path: raw.path.clone(),
                    kind: raw.kind,
                    watch_id: entry.id,
                });
            }
        }

        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::EventKind;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn canonical_root() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        (temp, root)
    }

    #[test]
    fn test_exact_file_match() {
        let (_temp, root) = canonical_root();
        let file = root.join("basictest.txt");
        fs::write(&file, "start").unwrap();

        let mut registry = WatchRegistry::new();
        let id = registry.add_file(&file).unwrap();
        let matcher = EventMatcher::new(&registry);

        let hits = matcher.resolve(&RawEvent::new(&file, EventKind::Modified));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].watch_id, id);
        assert_eq!(hits[0].kind, EventKind::Modified);

        // A sibling in the same directory is not a match
        let miss = matcher.resolve(&RawEvent::new(root.join("dummy.txt"), EventKind::Modified));
        assert!(miss.is_empty());
    }

    #[test]
    fn test_file_and_pattern_both_match() {
        let (_temp, root) = canonical_root();
        let file = root.join("photo.jpg");
        fs::write(&file, "jpg").unwrap();

        let mut registry = WatchRegistry::new();
        let file_id = registry.add_file(&file).unwrap();
        let jpg_id = registry.add_path(&root, r".*\.jpg").unwrap();
        let all_id = registry.add_path(&root, ".*").unwrap();
        let _png_id = registry.add_path(&root, r".*\.png").unwrap();

        let hits = EventMatcher::new(&registry).resolve(&RawEvent::new(&file, EventKind::Removed));
        let mut ids: Vec<_> = hits.iter().map(|e| e.watch_id).collect();
        ids.sort();

        let mut expected = vec![file_id, jpg_id, all_id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_pattern_respects_root() {
        let (_temp, root) = canonical_root();
        let a = root.join("a");
        let b = root.join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();

        let mut registry = WatchRegistry::new();
        let a_id = registry.add_path(&a, r".*\.jpg").unwrap();

        let matcher = EventMatcher::new(&registry);
        assert_eq!(
            matcher.resolve(&RawEvent::new(a.join("x.jpg"), EventKind::Added))[0].watch_id,
            a_id
        );
        assert!(
            matcher
                .resolve(&RawEvent::new(b.join("x.jpg"), EventKind::Added))
                .is_empty()
        );
    }

    #[test]
    fn test_duplicate_file_watches_each_get_an_event() {
        let (_temp, root) = canonical_root();
        let file = root.join("dup.txt");
        fs::write(&file, "x").unwrap();

        let mut registry = WatchRegistry::new();
        registry.add_file(&file).unwrap();
        registry.add_file(&file).unwrap();

        let hits = EventMatcher::new(&registry).resolve(&RawEvent::new(&file, EventKind::Modified));
        assert_eq!(hits.len(), 2);
        assert_ne!(hits[0].watch_id, hits[1].watch_id);
    }
}
