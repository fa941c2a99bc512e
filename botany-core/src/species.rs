//! Species records and their identifications

use log::{debug, error, warn};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{self, KeySet, Record};
use crate::error::{RecordError, Result};
use crate::identification::{Identification, IdentificationForm, IdentificationRecord};
use crate::storage::RecordFile;
use crate::walk::{is_photo, is_record_file, list_entries, RECORD_FILE_EXTENSION};

const KEY_NAME: &str = "name";
const KEY_LATIN: &str = "latin";
const KEY_COMMON: &str = "common";
const KEY_EDIBILITY: &str = "edibility";
const KEY_REFERENCES: &str = "references";

const REF_DELACHAUX_FLEURS: &str = "delachaux_fleurs";
const REF_GUIDE_700_PLANTES: &str = "guide_700_plantes";
const REF_FLORE_PYRENEES: &str = "flore_pyrenees";
const REF_DELACHAUX_ARBRES: &str = "delachaux_arbres";
const REF_CHAMPIGNONS: &str = "champignons";

/// Derives the record file name from a latin name
///
/// Lower-cased, trimmed, inner whitespace collapsed to single underscores.
pub fn file_name_for(latin_name: &str) -> String {
    let slug = latin_name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("{}.{}", slug, RECORD_FILE_EXTENSION)
}

/// Display form of a reference page, empty when absent
pub fn page_label(page: u32) -> String {
    if page == 0 {
        String::new()
    } else {
        format!("p. {}", page)
    }
}

// =========================================================================
// Record
// =========================================================================

/// Page numbers in the reference field guides, 0 meaning "not listed"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct References {
    pub delachaux_fleurs: u32,
    pub guide_700_plantes: u32,
    pub flore_pyrenees: u32,
    pub delachaux_arbres: u32,
    pub champignons: u32,
}

impl References {
    /// (label, page) pairs in display order
    pub fn entries(&self) -> [(&'static str, u32); 5] {
        [
            ("Delachaux fleurs", self.delachaux_fleurs),
            ("Guide 700 plantes", self.guide_700_plantes),
            ("Flore des Pyrénées", self.flore_pyrenees),
            ("Delachaux arbres", self.delachaux_arbres),
            ("Champignons", self.champignons),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeciesRecord {
    pub latin_name: String,
    pub common_name: String,
    pub edibility: String,
    pub references: References,
}

impl SpeciesRecord {
    /// Canonical record file name
    pub fn file_name(&self) -> String {
        file_name_for(&self.latin_name)
    }

    pub fn invalid_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.latin_name.trim().is_empty() {
            fields.push("latin_name".to_string());
        }
        if self.common_name.trim().is_empty() {
            fields.push("common_name".to_string());
        }
        fields
    }

    pub fn validate(&self) -> Result<()> {
        let fields = self.invalid_fields();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(RecordError::ValidationFailed(fields))
        }
    }

    /// Opens a staging copy for an edit dialog
    pub fn stage(&self) -> SpeciesForm {
        let page = |page: u32| {
            if page == 0 {
                String::new()
            } else {
                page.to_string()
            }
        };
        SpeciesForm {
            latin_name: self.latin_name.clone(),
            common_name: self.common_name.clone(),
            edibility: self.edibility.clone(),
            delachaux_fleurs: page(self.references.delachaux_fleurs),
            guide_700_plantes: page(self.references.guide_700_plantes),
            flore_pyrenees: page(self.references.flore_pyrenees),
            delachaux_arbres: page(self.references.delachaux_arbres),
            champignons: page(self.references.champignons),
        }
    }
}

impl Record for SpeciesRecord {
    const TOP_LEVEL_KEY: &'static str = "species";
    const REQUIRED_KEYS: &'static [KeySet] = &[
        KeySet::top(&[KEY_NAME]),
        KeySet::nested(&[KEY_NAME], &[KEY_LATIN, KEY_COMMON]),
    ];

    fn from_mapping(mapping: &Map<String, Value>) -> Self {
        let page = |key: &str| {
            u32::try_from(codec::integer(codec::lookup(mapping, &[KEY_REFERENCES, key])))
                .unwrap_or(0)
        };
        SpeciesRecord {
            latin_name: codec::text(codec::lookup(mapping, &[KEY_NAME, KEY_LATIN])),
            common_name: codec::text(codec::lookup(mapping, &[KEY_NAME, KEY_COMMON])),
            edibility: codec::text(mapping.get(KEY_EDIBILITY)),
            references: References {
                delachaux_fleurs: page(REF_DELACHAUX_FLEURS),
                guide_700_plantes: page(REF_GUIDE_700_PLANTES),
                flore_pyrenees: page(REF_FLORE_PYRENEES),
                delachaux_arbres: page(REF_DELACHAUX_ARBRES),
                champignons: page(REF_CHAMPIGNONS),
            },
        }
    }

    fn to_mapping(&self) -> Map<String, Value> {
        let value = json!({
            KEY_NAME: {
                KEY_LATIN: self.latin_name,
                KEY_COMMON: self.common_name,
            },
            KEY_EDIBILITY: self.edibility,
            KEY_REFERENCES: {
                REF_DELACHAUX_FLEURS: self.references.delachaux_fleurs,
                REF_GUIDE_700_PLANTES: self.references.guide_700_plantes,
                REF_FLORE_PYRENEES: self.references.flore_pyrenees,
                REF_DELACHAUX_ARBRES: self.references.delachaux_arbres,
                REF_CHAMPIGNONS: self.references.champignons,
            },
        });
        match value {
            Value::Object(mapping) => mapping,
            _ => Map::new(),
        }
    }
}

// =========================================================================
// Staging form
// =========================================================================

/// Editable text copy of a species, as typed in a dialog
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeciesForm {
    pub latin_name: String,
    pub common_name: String,
    pub edibility: String,
    pub delachaux_fleurs: String,
    pub guide_700_plantes: String,
    pub flore_pyrenees: String,
    pub delachaux_arbres: String,
    pub champignons: String,
}

impl SpeciesForm {
    /// Parses and checks every field, reporting all invalid ones at once
    ///
    /// Reference pages must be empty or a positive integer.
    pub fn validate(&self) -> Result<SpeciesRecord> {
        let mut invalid = Vec::new();
        let mut page = |name: &str, text: &str| -> u32 {
            let text = text.trim();
            if text.is_empty() {
                return 0;
            }
            match text.parse::<u32>() {
                Ok(page) if page > 0 => page,
                _ => {
                    invalid.push(name.to_string());
                    0
                }
            }
        };
        let references = References {
            delachaux_fleurs: page(REF_DELACHAUX_FLEURS, &self.delachaux_fleurs),
            guide_700_plantes: page(REF_GUIDE_700_PLANTES, &self.guide_700_plantes),
            flore_pyrenees: page(REF_FLORE_PYRENEES, &self.flore_pyrenees),
            delachaux_arbres: page(REF_DELACHAUX_ARBRES, &self.delachaux_arbres),
            champignons: page(REF_CHAMPIGNONS, &self.champignons),
        };

        let record = SpeciesRecord {
            latin_name: self.latin_name.trim().to_string(),
            common_name: self.common_name.trim().to_string(),
            edibility: self.edibility.trim().to_string(),
            references,
        };

        let mut fields = record.invalid_fields();
        fields.extend(invalid);
        if fields.is_empty() {
            Ok(record)
        } else {
            Err(RecordError::ValidationFailed(fields))
        }
    }
}

// =========================================================================
// Store
// =========================================================================

/// One species directory, loaded from disk along with its identifications
#[derive(Debug, Clone)]
pub struct Species {
    directory: PathBuf,
    file: RecordFile,
    record: SpeciesRecord,
    cover_photo: Option<PathBuf>,
    identifications: Vec<Identification>,
}

impl Species {
    /// Discovers an existing species directory
    ///
    /// The first JSON file holding a valid species record is used. Every
    /// sub-directory is tried as an identification; the ones that fail are
    /// logged and skipped.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let mut source: Option<(RecordFile, SpeciesRecord)> = None;
        let mut cover_photo = None;
        let mut identifications = Vec::new();

        for path in list_entries(&directory)? {
            if path.is_dir() {
                match Identification::open(&path) {
                    Ok(identification) => identifications.push(identification),
                    Err(e) => error!("Invalid species sub-directory {:?}: {}", path, e),
                }
            } else if is_photo(&path) {
                if cover_photo.is_none() {
                    cover_photo = Some(path);
                }
            } else if source.is_none() && is_record_file(&path) {
                let file = RecordFile::new(&path);
                match file
                    .load::<SpeciesRecord>()
                    .and_then(|record| record.validate().map(|_| record))
                {
                    Ok(record) => source = Some((file, record)),
                    Err(e) => error!("Invalid JSON file {:?}: {}", path, e),
                }
            }
        }

        let Some((file, record)) = source else {
            return Err(RecordError::InvalidRecordDirectory(directory));
        };
        if cover_photo.is_none() {
            warn!("No species photo found in {:?}", directory);
        }
        debug!(
            "Loaded species '{}' with {} identification(s)",
            record.latin_name,
            identifications.len()
        );

        Ok(Self {
            directory,
            file,
            record,
            cover_photo,
            identifications,
        })
    }

    /// Writes a new species record into `directory`
    ///
    /// The directory is created if needed. An existing file with the same
    /// derived name is never replaced.
    pub fn create<P: AsRef<Path>>(directory: P, record: SpeciesRecord) -> Result<Self> {
        record.validate()?;

        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| RecordError::io(&directory, e))?;

        let file = RecordFile::new(directory.join(record.file_name()));
        file.create(&record)?;

        let cover_photo = list_entries(&directory)?.into_iter().find(|p| is_photo(p));

        Ok(Self {
            directory,
            file,
            record,
            cover_photo,
            identifications: Vec::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn record_path(&self) -> &Path {
        self.file.path()
    }

    pub fn record(&self) -> &SpeciesRecord {
        &self.record
    }

    pub fn cover_photo(&self) -> Option<&Path> {
        self.cover_photo.as_deref()
    }

    /// Identifications ordered by directory name, hence chronologically
    pub fn identifications(&self) -> &[Identification] {
        &self.identifications
    }

    /// Opens a staging copy of the record for editing
    pub fn stage(&self) -> SpeciesForm {
        self.record.stage()
    }

    /// Validates the staging copy and writes it back in place
    ///
    /// Returns whether the record changed.
    pub fn commit(&mut self, form: &SpeciesForm) -> Result<bool> {
        let record = form.validate()?;
        if !self.file.save_changes(&self.record, &record)? {
            return Ok(false);
        }
        self.record = self.file.load()?;
        Ok(true)
    }

    /// Position of the identification stored in the directory `name`
    pub fn identification_index(&self, name: &str) -> Option<usize> {
        self.identifications
            .iter()
            .position(|identification| identification.directory_name() == name)
    }

    /// Validates the staging copy of the identification at `index` and
    /// writes it back
    ///
    /// A new date must not be held by another identification of this
    /// species; the directory is then renamed after the new date and the
    /// identifications are kept in order. Returns whether the record changed.
    pub fn commit_identification(
        &mut self,
        index: usize,
        form: &IdentificationForm,
    ) -> Result<bool> {
        let record = form.validate()?;
        let current = self
            .identifications
            .get(index)
            .ok_or(RecordError::UnknownIdentification(index))?;

        let date_changed = current.record().date != record.date;
        if date_changed {
            let taken = self
                .identifications
                .iter()
                .enumerate()
                .any(|(i, other)| i != index && other.record().date == record.date);
            if taken {
                return Err(RecordError::DuplicateDate(record.date.to_string()));
            }
        }

        let original = current.directory().to_path_buf();
        let target = self.directory.join(record.date.directory_name());
        let moved = date_changed && original != target;

        let identification = &mut self.identifications[index];
        if moved {
            identification.relocate(target)?;
        }
        let changed = match identification.commit_record(&record) {
            Ok(changed) => changed,
            Err(e) => {
                if moved {
                    if let Err(undo) = identification.relocate(original) {
                        warn!("Could not move identification back: {}", undo);
                    }
                }
                return Err(e);
            }
        };

        if moved {
            self.identifications
                .sort_by_key(|identification| identification.directory_name());
        }
        Ok(changed)
    }

    /// Creates a new identification and inserts it in order, without
    /// rescanning the directory
    pub fn add_identification(
        &mut self,
        record: IdentificationRecord,
    ) -> Result<&Identification> {
        let identification =
            Identification::create(&self.directory, &self.identifications, record)?;
        let name = identification.directory_name();
        let index = self
            .identifications
            .partition_point(|existing| existing.directory_name() <= name);
        self.identifications.insert(index, identification);
        Ok(&self.identifications[index])
    }
}
