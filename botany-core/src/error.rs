//! Error type shared by every record operation

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding, discovering or persisting records
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Could not serialize record: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Top level key not found: {0}")]
    MissingTopLevelKey(String),

    #[error("Invalid content for '{0}': expected an object")]
    InvalidShape(String),

    #[error("Missing required keys: {}", .0.join(", "))]
    MissingRequiredKeys(Vec<String>),

    #[error("No decodable metadata file in directory {0:?}")]
    InvalidRecordDirectory(PathBuf),

    #[error("An identification dated {0} already exists")]
    DuplicateDate(String),

    #[error("No identification at position {0}")]
    UnknownIdentification(usize),

    #[error("Directory already exists: {0:?}")]
    DirectoryAlreadyExists(PathBuf),

    #[error("Record file already exists: {0:?}")]
    RecordAlreadyExists(PathBuf),

    #[error("Invalid fields: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecordError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
