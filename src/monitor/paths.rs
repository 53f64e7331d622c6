//! Filesystem queries used when registering watches and scanning targets.
//!
//! Watched paths are canonicalized on registration so they compare equal to
//! the paths the operating system reports back (symlinked temp dirs on
//! macOS, for example).

use std::path::{Path, PathBuf};

use super::error::{MonitorError, MonitorResult};

/// Resolve `path` to an absolute path naming an existing regular file.
pub fn resolve_file(path: &Path) -> MonitorResult<PathBuf> {
    let resolved = canonical(path)?;
    if !resolved.is_file() {
        return Err(MonitorError::invalid_target(path, "not a regular file"));
    }
    Ok(resolved)
}

/// Resolve `path` to an absolute path naming an existing directory.
pub fn resolve_dir(path: &Path) -> MonitorResult<PathBuf> {
    let resolved = canonical(path)?;
    if !resolved.is_dir() {
        return Err(MonitorError::invalid_target(path, "not a directory"));
    }
    Ok(resolved)
}

/// Directory containing `path`. A bare file name resolves to `.`.
pub fn parent_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `path` relative to `root` with `/` separators, or `None` when `path`
/// lies outside `root`.
pub fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}

fn canonical(path: &Path) -> MonitorResult<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| MonitorError::invalid_target(path, e.to_string()))
}
