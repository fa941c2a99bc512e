use log::debug;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::codec::{self, Record};
use crate::error::{RecordError, Result};

/// Handles loading and saving one record file
///
/// Every write goes to a temporary file in the same directory which is then
/// renamed over the target, so the record on disk is always either the old
/// or the new content. No file locking is performed: the running process is
/// assumed to own the file for the duration of an edit.
#[derive(Debug, Clone)]
pub struct RecordFile {
    file_path: PathBuf,
}

impl RecordFile {
    /// Creates a new RecordFile instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    /// Returns the path to the record file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Reads and decodes the record
    pub fn load<R: Record>(&self) -> Result<R> {
        let bytes = fs::read(&self.file_path).map_err(|e| RecordError::io(&self.file_path, e))?;
        R::decode(&bytes)
    }

    /// Writes a brand new record file, refusing to replace an existing one
    pub fn create<R: Record>(&self, record: &R) -> Result<()> {
        if self.file_path.exists() {
            return Err(RecordError::RecordAlreadyExists(self.file_path.clone()));
        }
        let bytes = record.encode()?;
        write_atomically(&self.file_path, &bytes)
    }

    /// Read-modify-write of an existing record
    ///
    /// The record's keys are merged into the current document so keys this
    /// program does not know about are kept. A document that no longer
    /// parses is replaced by a fresh encoding of the record.
    pub fn save<R: Record>(&self, record: &R) -> Result<()> {
        let document = record.to_document();
        self.write_merged(document.clone(), document)
    }

    /// Read-modify-write of only the keys that differ from `previous`
    ///
    /// `previous` is the record as last loaded from this file. Keys whose
    /// value did not change are left exactly as they are on disk, even when
    /// the file omits them. Returns whether anything was written.
    pub fn save_changes<R: Record>(&self, previous: &R, record: &R) -> Result<bool> {
        let document = record.to_document();
        match codec::changes(&previous.to_document(), &document) {
            Some(update) => {
                self.write_merged(document, update)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Merges `update` into the document on disk, or writes `fresh` when
    /// there is no readable document to merge into
    fn write_merged(&self, fresh: Value, update: Value) -> Result<()> {
        let document = match fs::read(&self.file_path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(mut value @ Value::Object(_)) => {
                    codec::merge(&mut value, update);
                    value
                }
                _ => {
                    debug!("Replacing unreadable document {:?}", self.file_path);
                    fresh
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => fresh,
            Err(e) => return Err(RecordError::io(&self.file_path, e)),
        };

        let bytes = codec::to_pretty_bytes(&document)?;
        write_atomically(&self.file_path, &bytes)
    }
}

/// Replaces `path` with `bytes` through a synced temporary sibling file
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| RecordError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| RecordError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| RecordError::io(tmp.path(), e))?;
    tmp.flush().map_err(|e| RecordError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| RecordError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| RecordError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::KeySet;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    #[derive(Debug, PartialEq)]
    struct Note {
        title: String,
    }

    impl Record for Note {
        const TOP_LEVEL_KEY: &'static str = "note";
        const REQUIRED_KEYS: &'static [KeySet] = &[KeySet::top(&["title"])];

        fn from_mapping(mapping: &Map<String, Value>) -> Self {
            Note {
                title: codec::text(mapping.get("title")),
            }
        }

        fn to_mapping(&self) -> Map<String, Value> {
            let mut mapping = Map::new();
            mapping.insert("title".into(), json!(self.title));
            mapping
        }
    }

    #[test]
    fn test_create_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = RecordFile::new(temp_dir.path().join("note.json"));

        file.create(&Note { title: "a".into() }).unwrap();
        let loaded: Note = file.load().unwrap();
        assert_eq!(loaded.title, "a");
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = RecordFile::new(temp_dir.path().join("note.json"));
        file.create(&Note { title: "a".into() }).unwrap();

        let err = file.create(&Note { title: "b".into() }).unwrap_err();
        assert!(matches!(err, RecordError::RecordAlreadyExists(_)));
        assert_eq!(file.load::<Note>().unwrap().title, "a");
    }

    #[test]
    fn test_save_keeps_unknown_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("note.json");
        fs::write(&path, r#"{"note": {"title": "old", "tags": ["x"]}, "meta": 1}"#).unwrap();

        RecordFile::new(&path).save(&Note { title: "new".into() }).unwrap();

        let value: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value, json!({"note": {"title": "new", "tags": ["x"]}, "meta": 1}));
    }

    #[test]
    fn test_save_changes_skips_unchanged_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("note.json");
        let raw = r#"{"note":{"title":"a"}}"#;
        fs::write(&path, raw).unwrap();
        let file = RecordFile::new(&path);
        let previous = Note { title: "a".into() };

        assert!(!file.save_changes(&previous, &Note { title: "a".into() }).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), raw);

        assert!(file.save_changes(&previous, &Note { title: "b".into() }).unwrap());
        assert_eq!(file.load::<Note>().unwrap().title, "b");
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("note.json");
        let file = RecordFile::new(&path);
        file.create(&Note { title: "a".into() }).unwrap();
        file.save(&Note { title: "b".into() }).unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
