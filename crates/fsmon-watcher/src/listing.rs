//! On-demand directory listings for observers.
//!
//! Consumers that present a directory browser next to the event stream need
//! the current contents of a directory. The engine keeps no file-level
//! state, so the listing is recomputed from the filesystem on every call.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// The entry's name within its directory.
    pub name: String,

    /// The entry's full path.
    pub path: Utf8PathBuf,

    /// Whether the entry is a directory (symlinks are not followed).
    pub is_dir: bool,
}

/// Returns the flat listing of `path`, sorted by name.
///
/// Entries with non-UTF-8 names are logged and skipped, matching how the
/// rest of the engine treats such names.
///
/// # Errors
///
/// Returns the underlying I/O error if the directory cannot be read.
pub fn list_directory(path: &Utf8Path) -> io::Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(path.as_std_path())? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(path = %path, %error, "unreadable directory entry, skipping");
                continue;
            }
        };
        let Ok(entry_path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            tracing::warn!(
                path = %entry.path().display(),
                "skipping entry with non-UTF-8 name"
            );
            continue;
        };
        let Some(name) = entry_path.file_name() else {
            continue;
        };
        let is_dir = entry.file_type().is_ok_and(|ft| ft.is_dir());
        entries.push(DirectoryEntry {
            name: name.to_owned(),
            path: entry_path,
            is_dir,
        });
    }
    entries.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path")
    }

    #[test]
    fn test_listing_is_sorted_and_flat() {
        let temp = TempDir::new().expect("temp dir");
        let root = utf8_path(&temp);
        fs::create_dir(root.join("sub").as_std_path()).expect("dir");
        fs::write(root.join("b.txt").as_std_path(), "x").expect("file");
        fs::write(root.join("a.txt").as_std_path(), "x").expect("file");
        fs::write(root.join("sub/nested.txt").as_std_path(), "x").expect("file");

        let entries = list_directory(&root).expect("listing");
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);

        assert!(!entries[0].is_dir);
        assert!(entries[2].is_dir);
        assert_eq!(entries[2].path, root.join("sub"));
    }

    #[test]
    fn test_listing_reflects_current_state() {
        let temp = TempDir::new().expect("temp dir");
        let root = utf8_path(&temp);

        assert!(list_directory(&root).expect("listing").is_empty());

        fs::write(root.join("new.txt").as_std_path(), "x").expect("file");
        let entries = list_directory(&root).expect("listing");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "new.txt");
    }

    #[test]
    fn test_listing_missing_directory_errors() {
        assert!(list_directory(Utf8Path::new("/nonexistent/fsmon")).is_err());
    }
}
