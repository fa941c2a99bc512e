use log::error;
use serde_json::{json, Map, Value};
use std::env;
use std::path::{Path, PathBuf};

use crate::codec::{self, KeySet, Record};
use crate::error::{RecordError, Result};
use crate::storage::RecordFile;

/// Name of the workspace pointer file, looked up in the working directory
pub const WORKSPACE_FILE: &str = "workspace.json";

/// Environment variable overriding the workspace pointer file
pub const WORKSPACE_ENV_VAR: &str = "BOTANY_WORKSPACE";

const KEY_DIRECTORY_PATH: &str = "directory_path";

/// Points at the root directory of the classification tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkspaceConfig {
    pub directory_path: PathBuf,
}

impl Record for WorkspaceConfig {
    const TOP_LEVEL_KEY: &'static str = "workspace";
    const REQUIRED_KEYS: &'static [KeySet] = &[];

    fn from_mapping(mapping: &Map<String, Value>) -> Self {
        WorkspaceConfig {
            directory_path: PathBuf::from(codec::text(mapping.get(KEY_DIRECTORY_PATH))),
        }
    }

    fn to_mapping(&self) -> Map<String, Value> {
        let mut mapping = Map::new();
        mapping.insert(
            KEY_DIRECTORY_PATH.to_string(),
            json!(self.directory_path.to_string_lossy()),
        );
        mapping
    }
}

impl WorkspaceConfig {
    pub fn new<P: AsRef<Path>>(directory_path: P) -> Self {
        Self {
            directory_path: directory_path.as_ref().to_path_buf(),
        }
    }

    /// Loads the pointer file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        RecordFile::new(path).load()
    }

    /// Saves the pointer file at `path`, creating it if needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        RecordFile::new(path).save(self)
    }

    pub fn is_set(&self) -> bool {
        !self.directory_path.as_os_str().is_empty()
    }
}

/// Gets the path to the workspace pointer file in the working directory
pub fn get_workspace_file_path() -> Result<PathBuf> {
    let cwd = env::current_dir().map_err(|e| RecordError::io(".", e))?;
    Ok(cwd.join(WORKSPACE_FILE))
}

/// Determines the workspace root from, in order: the explicit option, the
/// `BOTANY_WORKSPACE` environment variable, the pointer file
///
/// Returns `None` when nothing usable is configured, in which case the
/// caller asks the user to pick a directory.
pub fn determine_workspace_root(explicit: Option<&Path>, pointer_file: &Path) -> Option<PathBuf> {
    let from_env = env::var(WORKSPACE_ENV_VAR).ok();
    resolve_workspace_root(explicit, from_env.as_deref(), pointer_file)
}

fn resolve_workspace_root(
    explicit: Option<&Path>,
    from_env: Option<&str>,
    pointer_file: &Path,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(value) = from_env.filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(value));
    }

    if !pointer_file.exists() {
        return None;
    }
    match WorkspaceConfig::load(pointer_file) {
        Ok(config) if config.is_set() => Some(config.directory_path),
        Ok(_) => None,
        Err(e) => {
            error!("Invalid workspace file {:?}: {}", pointer_file, e);
            None
        }
    }
}
