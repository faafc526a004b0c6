//! The watch table: kernel handle ↔ directory path mapping.
//!
//! This module provides [`WatchTable`], the bidirectional mapping between
//! opaque kernel watch handles and the absolute directory paths they stand
//! for. No other component interprets a handle; they resolve it here and
//! treat a failed resolution as "directory already gone".

use camino::{Utf8Path, Utf8PathBuf};
use fsmon_core::{FxHashMap, fx_hash_map};

use crate::source::WatchHandle;

/// Bidirectional mapping between kernel watch handles and directory paths.
///
/// Grows without bound as the watched tree grows; both directions are hash
/// maps, so inserts and lookups are amortized O(1). Entries are removed when
/// the kernel invalidates a watch (the directory was deleted or moved away),
/// which keeps reused handle values from aliasing to a stale path.
///
/// # Invariant
///
/// At any point the set of live paths equals the set of directories the
/// registrar has watched and the kernel has not yet invalidated. A handle
/// the kernel reports either resolves to exactly one live path or is stale;
/// stale handles are ignored by callers, never an error.
///
/// # Examples
///
/// ```
/// use fsmon_watcher::WatchTable;
///
/// let table = WatchTable::new();
/// assert!(table.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct WatchTable {
    /// Handle → path: resolution of incoming event records.
    by_handle: FxHashMap<WatchHandle, Utf8PathBuf>,

    /// Path → handle: dedupe during registration and re-listing.
    by_path: FxHashMap<Utf8PathBuf, WatchHandle>,
}

impl WatchTable {
    /// Creates an empty watch table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_handle: fx_hash_map(),
            by_path: fx_hash_map(),
        }
    }

    /// Records a watched directory under its kernel handle.
    ///
    /// The kernel returns the existing handle when a directory is watched
    /// twice; if the handle was previously registered under a different
    /// path (the directory moved within the tree), the old path mapping is
    /// dropped so only the current path resolves.
    pub fn register(&mut self, handle: WatchHandle, path: Utf8PathBuf) {
        if let Some(previous) = self.by_handle.insert(handle, path.clone()) {
            if previous != path {
                self.by_path.remove(&previous);
            }
        }
        self.by_path.insert(path, handle);
    }

    /// Resolves a kernel handle to the directory it was registered for.
    ///
    /// Returns `None` for a handle that was never registered or whose entry
    /// has been removed. Callers treat `None` as "directory already gone"
    /// and discard the event.
    #[inline]
    #[must_use]
    pub fn resolve(&self, handle: WatchHandle) -> Option<&Utf8Path> {
        self.by_handle.get(&handle).map(Utf8PathBuf::as_path)
    }

    /// Removes the entry for a handle, returning the path it mapped to.
    ///
    /// Called when the kernel signals that a watch went away. Freeing the
    /// slot is what allows the kernel to reuse the handle value safely.
    pub fn unregister(&mut self, handle: WatchHandle) -> Option<Utf8PathBuf> {
        let path = self.by_handle.remove(&handle)?;
        self.by_path.remove(&path);
        Some(path)
    }

    /// Returns `true` if the given directory currently has a live watch.
    #[inline]
    #[must_use]
    pub fn is_watched(&self, path: &Utf8Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Returns the number of live watches.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    /// Returns `true` if no watches are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// Returns an iterator over the currently watched directory paths.
    pub fn paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.by_path.keys().map(Utf8PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(wd: i32) -> WatchHandle {
        WatchHandle::from_raw(wd)
    }

    #[test]
    fn test_register_and_resolve() {
        let mut table = WatchTable::new();
        table.register(handle(1), Utf8PathBuf::from("/srv/data"));

        assert_eq!(
            table.resolve(handle(1)).map(Utf8Path::as_str),
            Some("/srv/data")
        );
        assert!(table.is_watched(Utf8Path::new("/srv/data")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_handle() {
        let table = WatchTable::new();
        assert!(table.resolve(handle(42)).is_none());
    }

    #[test]
    fn test_unregister_makes_handle_stale() {
        let mut table = WatchTable::new();
        table.register(handle(1), Utf8PathBuf::from("/srv/data"));

        let removed = table.unregister(handle(1));
        assert_eq!(removed, Some(Utf8PathBuf::from("/srv/data")));
        assert!(table.resolve(handle(1)).is_none());
        assert!(!table.is_watched(Utf8Path::new("/srv/data")));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unregister_unknown_handle() {
        let mut table = WatchTable::new();
        assert!(table.unregister(handle(7)).is_none());
    }

    #[test]
    fn test_handle_reuse_resolves_to_new_path_only() {
        let mut table = WatchTable::new();
        table.register(handle(1), Utf8PathBuf::from("/srv/old"));
        table.unregister(handle(1));

        // The kernel may hand the same descriptor value to a new directory
        table.register(handle(1), Utf8PathBuf::from("/srv/new"));
        assert_eq!(
            table.resolve(handle(1)).map(Utf8Path::as_str),
            Some("/srv/new")
        );
        assert!(!table.is_watched(Utf8Path::new("/srv/old")));
    }

    #[test]
    fn test_reregistering_handle_under_new_path_drops_old_mapping() {
        let mut table = WatchTable::new();
        table.register(handle(1), Utf8PathBuf::from("/srv/before"));
        // Same inode, new location: the kernel reuses the handle
        table.register(handle(1), Utf8PathBuf::from("/srv/after"));

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.resolve(handle(1)).map(Utf8Path::as_str),
            Some("/srv/after")
        );
        assert!(!table.is_watched(Utf8Path::new("/srv/before")));
        assert!(table.is_watched(Utf8Path::new("/srv/after")));
    }

    #[test]
    fn test_many_entries() {
        let mut table = WatchTable::new();
        for wd in 0..2_000 {
            table.register(handle(wd), Utf8PathBuf::from(format!("/srv/dir{wd}")));
        }
        assert_eq!(table.len(), 2_000);
        assert_eq!(
            table.resolve(handle(1_999)).map(Utf8Path::as_str),
            Some("/srv/dir1999")
        );
    }

    #[test]
    fn test_paths_iterator() {
        let mut table = WatchTable::new();
        table.register(handle(1), Utf8PathBuf::from("/srv/a"));
        table.register(handle(2), Utf8PathBuf::from("/srv/b"));

        let mut paths: Vec<&str> = table.paths().map(Utf8Path::as_str).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["/srv/a", "/srv/b"]);
    }
}
