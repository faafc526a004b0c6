//! Recursive watch registration.
//!
//! This module walks a directory tree and registers a kernel watch for
//! every directory in it, populating the watch table as it goes. The same
//! entry point serves the initial pass over the configured roots and the
//! live extension that happens when a new directory appears inside the
//! watched tree.
//!
//! # Ordering
//!
//! Children are registered before their parent. When a fresh subtree is
//! created and populated rapidly, parent-first registration would watch the
//! parent while its children are still unwatched and lose their events;
//! child-first ordering narrows that window. The walk itself cannot close
//! the window entirely: a directory created between the listing and the
//! watch call is invisible to both. To catch those, every directory is
//! listed a second time right after its own watch is registered, and any
//! subdirectory not yet in the table is walked too.
//!
//! The walk uses an explicit work stack rather than native recursion, so
//! tree depth is bounded by heap, not stack.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::WatchError;
use crate::source::EventSource;
use crate::table::WatchTable;

/// A pending step of the iterative walk.
///
/// `Descend` queues a directory for processing; `Register` performs the
/// watch call after all of the directory's children have been handled.
#[derive(Debug)]
enum Frame {
    Descend(Utf8PathBuf),
    Register(Utf8PathBuf),
}

/// Walks `root` and registers a watch on every directory in its subtree.
///
/// Children are registered before their parents, each directory is
/// re-listed after its own registration (see the module docs), symbolic
/// links are not followed, and non-directory entries are skipped.
///
/// Failures below the root are logged and skip only the affected subtree.
/// Returns the number of watches newly registered by this call; directories
/// already present in the table are left alone, so calling this again on an
/// already-watched subtree is a no-op.
///
/// # Errors
///
/// Returns [`WatchError::Registration`] only if the watch on `root` itself
/// cannot be registered. Callers treat that as fatal for a configured root
/// at startup and as a logged warning when extending the watch set at
/// runtime.
pub fn watch_recursive(
    source: &EventSource,
    table: &mut WatchTable,
    root: &Utf8Path,
) -> Result<usize, WatchError> {
    let mut registered = 0usize;
    let mut stack = vec![Frame::Descend(root.to_owned())];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Descend(dir) => {
                if table.is_watched(&dir) {
                    continue;
                }
                // The Register frame stays below the children frames, so
                // every child is fully handled before this directory is.
                stack.push(Frame::Register(dir.clone()));
                match list_subdirectories(&dir) {
                    Ok(children) => {
                        for child in children {
                            stack.push(Frame::Descend(child));
                        }
                    }
                    Err(error) => {
                        // The directory itself may still be watchable
                        tracing::warn!(path = %dir, %error, "cannot list directory, skipping its subtree");
                    }
                }
            }
            Frame::Register(dir) => {
                if table.is_watched(&dir) {
                    continue;
                }
                let handle = match source.add_watch(&dir) {
                    Ok(handle) => handle,
                    Err(error) => {
                        if dir.as_path() == root {
                            return Err(WatchError::registration(dir, error));
                        }
                        tracing::warn!(path = %dir, %error, "cannot watch directory, skipping");
                        continue;
                    }
                };
                table.register(handle, dir.clone());
                registered += 1;
                tracing::debug!(path = %dir, %handle, "watch registered");

                // Catch subdirectories created between the earlier listing
                // and the watch call just made
                if let Ok(children) = list_subdirectories(&dir) {
                    for child in children {
                        if !table.is_watched(&child) {
                            stack.push(Frame::Descend(child));
                        }
                    }
                }
            }
        }
    }

    Ok(registered)
}

/// Lists the immediate subdirectories of `dir`.
///
/// Symbolic links are not followed (a symlink to a directory does not count
/// as a directory here), and entries with non-UTF-8 names are logged and
/// skipped.
fn list_subdirectories(dir: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir.as_std_path())? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(path = %dir, %error, "unreadable directory entry, skipping");
                continue;
            }
        };
        // DirEntry::file_type does not traverse symlinks, which is exactly
        // the no-follow behavior wanted here
        let is_dir = entry.file_type().is_ok_and(|ft| ft.is_dir());
        if !is_dir {
            continue;
        }
        match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(path) => dirs.push(path),
            Err(path) => {
                tracing::warn!(
                    path = %path.display(),
                    "skipping directory with non-UTF-8 name"
                );
            }
        }
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path")
    }

    #[tokio::test]
    async fn test_registers_every_directory_in_tree() {
        let temp = TempDir::new().expect("temp dir");
        let root = utf8_path(&temp);
        fs::create_dir_all(root.join("a/b/c").as_std_path()).expect("tree");
        fs::create_dir(root.join("d").as_std_path()).expect("tree");
        fs::write(root.join("a/file.txt").as_std_path(), "x").expect("file");

        let source = EventSource::new().expect("event source");
        let mut table = WatchTable::new();
        let count = watch_recursive(&source, &mut table, &root).expect("walk");

        assert_eq!(count, 5); // root, a, a/b, a/b/c, d
        for dir in ["", "a", "a/b", "a/b/c", "d"] {
            assert!(
                table.is_watched(&root.join(dir)),
                "expected a watch on {dir:?}"
            );
        }
        assert!(!table.is_watched(&root.join("a/file.txt")));
    }

    #[tokio::test]
    async fn test_symlinked_directories_are_not_followed() {
        let temp = TempDir::new().expect("temp dir");
        let root = utf8_path(&temp);
        fs::create_dir(root.join("real").as_std_path()).expect("dir");
        std::os::unix::fs::symlink(
            root.join("real").as_std_path(),
            root.join("link").as_std_path(),
        )
        .expect("symlink");

        let source = EventSource::new().expect("event source");
        let mut table = WatchTable::new();
        let count = watch_recursive(&source, &mut table, &root).expect("walk");

        assert_eq!(count, 2); // root and real; link is skipped
        assert!(table.is_watched(&root.join("real")));
        assert!(!table.is_watched(&root.join("link")));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let source = EventSource::new().expect("event source");
        let mut table = WatchTable::new();

        let result = watch_recursive(&source, &mut table, Utf8Path::new("/nonexistent/fsmon"));
        assert!(matches!(result, Err(WatchError::Registration { .. })));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_second_walk_is_a_no_op() {
        let temp = TempDir::new().expect("temp dir");
        let root = utf8_path(&temp);
        fs::create_dir(root.join("a").as_std_path()).expect("dir");

        let source = EventSource::new().expect("event source");
        let mut table = WatchTable::new();
        assert_eq!(watch_recursive(&source, &mut table, &root).expect("walk"), 2);
        assert_eq!(watch_recursive(&source, &mut table, &root).expect("walk"), 0);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_extension_registers_only_new_subtree() {
        let temp = TempDir::new().expect("temp dir");
        let root = utf8_path(&temp);
        fs::create_dir(root.join("a").as_std_path()).expect("dir");

        let source = EventSource::new().expect("event source");
        let mut table = WatchTable::new();
        watch_recursive(&source, &mut table, &root).expect("walk");

        // A directory created after the initial pass extends the watch set
        fs::create_dir_all(root.join("b/inner").as_std_path()).expect("dir");
        let added = watch_recursive(&source, &mut table, &root.join("b")).expect("extend");

        assert_eq!(added, 2);
        assert!(table.is_watched(&root.join("b")));
        assert!(table.is_watched(&root.join("b/inner")));
    }
}
