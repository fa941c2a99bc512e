//! Filesystem traversal shared by the classification index and record
//! discovery.

use log::warn;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{RecordError, Result};

/// Extension of record metadata files
pub const RECORD_FILE_EXTENSION: &str = "json";

/// Extension of photo files
pub const PHOTO_FILE_EXTENSION: &str = "jpg";

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

pub fn is_record_file(path: &Path) -> bool {
    path.is_file() && has_extension(path, RECORD_FILE_EXTENSION)
}

pub fn is_photo(path: &Path) -> bool {
    path.is_file() && has_extension(path, PHOTO_FILE_EXTENSION)
}

/// Immediate entries of `directory`, sorted by file name
pub fn list_entries(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(directory).map_err(|e| RecordError::io(directory, e))? {
        let entry = entry.map_err(|e| RecordError::io(directory, e))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Visits every directory below `root` whose depth relative to `root` lies in
/// `depths`, in depth-first pre-order with siblings sorted by name.
///
/// Symbolic links are not followed. Unreadable entries are logged and
/// skipped; only an unreadable root is an error.
pub fn walk_directories<F>(root: &Path, depths: RangeInclusive<usize>, mut visitor: F) -> Result<()>
where
    F: FnMut(&Path, usize),
{
    fs::read_dir(root).map_err(|e| RecordError::io(root, e))?;

    let walker = WalkDir::new(root)
        .min_depth(*depths.start())
        .max_depth(*depths.end())
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => visitor(entry.path(), entry.depth()),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry under {:?}: {}", root, e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let upper = temp_dir.path().join("A.JPG");
        fs::write(&upper, b"").unwrap();
        let json = temp_dir.path().join("a.Json");
        fs::write(&json, b"{}").unwrap();

        assert!(is_photo(&upper));
        assert!(!is_record_file(&upper));
        assert!(is_record_file(&json));
    }

    #[test]
    fn test_directory_named_like_a_file_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("fake.json");
        fs::create_dir(&dir).unwrap();
        assert!(!is_record_file(&dir));
    }

    #[test]
    fn test_list_entries_sorted() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["c", "a", "b"] {
            fs::write(temp_dir.path().join(name), b"").unwrap();
        }
        let names: Vec<_> = list_entries(temp_dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_walk_respects_depth_range() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a/b/c/d")).unwrap();
        fs::create_dir_all(temp_dir.path().join("e")).unwrap();
        fs::write(temp_dir.path().join("a/file.txt"), b"").unwrap();

        let mut visited = Vec::new();
        walk_directories(temp_dir.path(), 1..=2, |path, depth| {
            let relative = path.strip_prefix(temp_dir.path()).unwrap().to_path_buf();
            visited.push((relative, depth));
        })
        .unwrap();

        assert_eq!(
            visited,
            vec![
                (PathBuf::from("a"), 1),
                (PathBuf::from("a/b"), 2),
                (PathBuf::from("e"), 1),
            ]
        );
    }

    #[test]
    fn test_walk_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = walk_directories(&temp_dir.path().join("missing"), 1..=7, |_, _| {});
        assert!(matches!(result, Err(RecordError::Io { .. })));
    }
}
