pub mod classification;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod identification;
pub mod species;
pub mod storage;
pub mod walk;
pub mod workspace;

// Re-export commonly used types
pub use classification::{display_name, ClassificationIndex, Rank, RankNode};
pub use codec::{KeySet, Record};
pub use cursor::Cursor;
pub use error::{RecordError, Result};
pub use identification::{
    Gps, Identification, IdentificationForm, IdentificationRecord, Location, ObservationDate,
    IDENTIFICATION_FILE_NAME, INVALID_DATE_DIRECTORY_NAME,
};
pub use species::{file_name_for, page_label, References, Species, SpeciesForm, SpeciesRecord};
pub use storage::RecordFile;
pub use walk::{PHOTO_FILE_EXTENSION, RECORD_FILE_EXTENSION};
pub use workspace::{
    determine_workspace_root, get_workspace_file_path, WorkspaceConfig, WORKSPACE_ENV_VAR,
    WORKSPACE_FILE,
};
