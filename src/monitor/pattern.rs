//! Compiled path patterns for directory watches.

use std::path::Path;

use regex::Regex;

use super::error::{MonitorError, MonitorResult};
use super::paths::relative_to;

/// A regular expression tested against paths relative to a watch root.
///
/// The expression must match the whole relative path (it is anchored at
/// both ends), and the relative path uses `/` separators on every platform.
/// Whether subdirectories match is up to the expression: `.*\.jpg` matches
/// `sub/a.jpg`, `[^/]*\.jpg` does not.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    pub fn new(pattern: &str) -> MonitorResult<Self> {
        let regex =
            Regex::new(&format!("^(?:{pattern})$")).map_err(|source| MonitorError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The expression as written by the caller.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Test a root-relative path string.
    pub fn is_match(&self, relative: &str) -> bool {
        self.regex.is_match(relative)
    }

    /// Test `path` against the pattern, relative to `root`.
    ///
    /// Paths outside `root` never match.
    pub fn matches_under(&self, root: &Path, path: &Path) -> bool {
        relative_to(path, root).is_some_and(|relative| self.is_match(&relative))
    }
}
