//! Identification records: one field observation of a species
//!
//! An identification lives in its own `YYYY_MM_DD` directory under the
//! species directory, holding `identification.json` and the observation
//! photos.

use chrono::NaiveDate;
use log::{debug, error, warn};
use serde_json::{json, Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{self, KeySet, Record};
use crate::error::{RecordError, Result};
use crate::storage::RecordFile;
use crate::walk::{is_photo, is_record_file, list_entries};

/// File name used when creating a new identification
pub const IDENTIFICATION_FILE_NAME: &str = "identification.json";

/// Directory name derived from a date that is not a valid calendar date
pub const INVALID_DATE_DIRECTORY_NAME: &str = "invalid_date";

const KEY_DATE: &str = "date";
const KEY_DAY: &str = "day";
const KEY_MONTH: &str = "month";
const KEY_YEAR: &str = "year";
const KEY_LOCATION: &str = "location";
const KEY_CITY: &str = "city";
const KEY_DEPARTMENT: &str = "department";
const KEY_COUNTRY: &str = "country";
const KEY_GPS: &str = "gps";
const KEY_LATITUDE: &str = "latitude";
const KEY_LONGITUDE: &str = "longitude";
const KEY_ALTITUDE: &str = "altitude";
const KEY_DESCRIPTION: &str = "description";

/// Bound applied to both GPS coordinates
pub const GPS_COORDINATE_LIMIT: f64 = 90.0;

// =========================================================================
// Record
// =========================================================================

/// Day of observation, kept as raw components so an invalid date can still
/// be loaded and displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObservationDate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl ObservationDate {
    pub fn new(day: u32, month: u32, year: i32) -> Self {
        Self { day, month, year }
    }

    /// The calendar date, if the components form one
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn is_valid(&self) -> bool {
        self.to_naive().is_some()
    }

    /// Canonical directory name `YYYY_MM_DD`, or the invalid-date sentinel
    pub fn directory_name(&self) -> String {
        match self.to_naive() {
            Some(date) => date.format("%Y_%m_%d").to_string(),
            None => INVALID_DATE_DIRECTORY_NAME.to_string(),
        }
    }
}

impl fmt::Display for ObservationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_naive() {
            Some(date) => write!(f, "{}", date.format("%d/%m/%Y")),
            None => write!(f, "{}/{}/{}", self.day, self.month, self.year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gps {
    /// Degrees in [-90, 90], 0 when absent
    pub latitude: f64,
    /// Degrees in [-90, 90], 0 when absent
    pub longitude: f64,
    /// Meters, 0 when absent
    pub altitude: i64,
}

impl fmt::Display for Gps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}° {}° ({}m)",
            self.latitude, self.longitude, self.altitude
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Location {
    pub city: String,
    pub department: String,
    pub country: String,
    pub gps: Gps,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentificationRecord {
    pub date: ObservationDate,
    pub location: Location,
    pub description: String,
}

fn coordinate_in_range(value: f64) -> bool {
    value.is_finite() && (-GPS_COORDINATE_LIMIT..=GPS_COORDINATE_LIMIT).contains(&value)
}

impl IdentificationRecord {
    /// Names of the fields that break the record invariants
    pub fn invalid_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if !self.date.is_valid() {
            fields.push(KEY_DATE);
        }
        if self.location.city.trim().is_empty() {
            fields.push(KEY_CITY);
        }
        if self.location.department.trim().is_empty() {
            fields.push(KEY_DEPARTMENT);
        }
        if self.location.country.trim().is_empty() {
            fields.push(KEY_COUNTRY);
        }
        if !coordinate_in_range(self.location.gps.latitude) {
            fields.push(KEY_LATITUDE);
        }
        if !coordinate_in_range(self.location.gps.longitude) {
            fields.push(KEY_LONGITUDE);
        }
        if self.location.gps.altitude < 0 {
            fields.push(KEY_ALTITUDE);
        }
        fields.into_iter().map(String::from).collect()
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
    pub fn stage(&self) -> IdentificationForm {
        IdentificationForm {
            day: self.date.day.to_string(),
            month: self.date.month.to_string(),
            year: self.date.year.to_string(),
            city: self.location.city.clone(),
            department: self.location.department.clone(),
            country: self.location.country.clone(),
            latitude: self.location.gps.latitude.to_string(),
            longitude: self.location.gps.longitude.to_string(),
            altitude: self.location.gps.altitude.to_string(),
            description: self.description.clone(),
        }
    }
}

impl Record for IdentificationRecord {
    const TOP_LEVEL_KEY: &'static str = "identification";
    const REQUIRED_KEYS: &'static [KeySet] = &[
        KeySet::top(&[KEY_DATE, KEY_LOCATION]),
        KeySet::nested(&[KEY_DATE], &[KEY_DAY, KEY_MONTH, KEY_YEAR]),
        KeySet::nested(
            &[KEY_LOCATION],
            &[KEY_CITY, KEY_DEPARTMENT, KEY_COUNTRY, KEY_GPS],
        ),
        KeySet::nested(
            &[KEY_LOCATION, KEY_GPS],
            &[KEY_LATITUDE, KEY_LONGITUDE, KEY_ALTITUDE],
        ),
    ];

    fn from_mapping(mapping: &Map<String, Value>) -> Self {
        let component = |key: &str| codec::integer(codec::lookup(mapping, &[KEY_DATE, key]));
        let coordinate = |key: &str| {
            let value = codec::number(codec::lookup(mapping, &[KEY_LOCATION, KEY_GPS, key]));
            if coordinate_in_range(value) {
                value
            } else {
                warn!("GPS {} out of range ({}), stored as 0", key, value);
                0.0
            }
        };
        let altitude =
            codec::integer(codec::lookup(mapping, &[KEY_LOCATION, KEY_GPS, KEY_ALTITUDE])).max(0);

        IdentificationRecord {
            date: ObservationDate {
                day: u32::try_from(component(KEY_DAY)).unwrap_or(0),
                month: u32::try_from(component(KEY_MONTH)).unwrap_or(0),
                year: i32::try_from(component(KEY_YEAR)).unwrap_or(0),
            },
            location: Location {
                city: codec::text(codec::lookup(mapping, &[KEY_LOCATION, KEY_CITY])),
                department: codec::text(codec::lookup(mapping, &[KEY_LOCATION, KEY_DEPARTMENT])),
                country: codec::text(codec::lookup(mapping, &[KEY_LOCATION, KEY_COUNTRY])),
                gps: Gps {
                    latitude: coordinate(KEY_LATITUDE),
                    longitude: coordinate(KEY_LONGITUDE),
                    altitude,
                },
            },
            description: codec::text(mapping.get(KEY_DESCRIPTION)),
        }
    }

    fn to_mapping(&self) -> Map<String, Value> {
        let value = json!({
            KEY_DATE: {
                KEY_DAY: self.date.day,
                KEY_MONTH: self.date.month,
                KEY_YEAR: self.date.year,
            },
            KEY_LOCATION: {
                KEY_CITY: self.location.city,
                KEY_DEPARTMENT: self.location.department,
                KEY_COUNTRY: self.location.country,
                KEY_GPS: {
                    KEY_LATITUDE: self.location.gps.latitude,
                    KEY_LONGITUDE: self.location.gps.longitude,
                    KEY_ALTITUDE: self.location.gps.altitude,
                },
            },
            KEY_DESCRIPTION: self.description,
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

/// Editable text copy of an identification, as typed in a dialog
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentificationForm {
    pub day: String,
    pub month: String,
    pub year: String,
    pub city: String,
    pub department: String,
    pub country: String,
    pub latitude: String,
    pub longitude: String,
    pub altitude: String,
    pub description: String,
}

impl IdentificationForm {
    /// Parses and checks every field, reporting all invalid ones at once
    ///
    /// Empty GPS fields mean "absent" and are stored as 0.
    pub fn validate(&self) -> Result<IdentificationRecord> {
        let coordinate = |text: &str| -> f64 {
            let text = text.trim();
            if text.is_empty() {
                0.0
            } else {
                text.parse().unwrap_or(f64::NAN)
            }
        };
        let altitude = {
            let text = self.altitude.trim();
            if text.is_empty() {
                0
            } else {
                text.parse().unwrap_or(-1)
            }
        };

        let record = IdentificationRecord {
            date: ObservationDate {
                day: self.day.trim().parse().unwrap_or(0),
                month: self.month.trim().parse().unwrap_or(0),
                year: self.year.trim().parse().unwrap_or(0),
            },
            location: Location {
                city: self.city.trim().to_string(),
                department: self.department.trim().to_string(),
                country: self.country.trim().to_string(),
                gps: Gps {
                    latitude: coordinate(&self.latitude),
                    longitude: coordinate(&self.longitude),
                    altitude,
                },
            },
            description: self.description.trim().to_string(),
        };
        record.validate()?;
        Ok(record)
    }
}

// =========================================================================
// Store
// =========================================================================

/// One identification directory, loaded from disk
#[derive(Debug, Clone)]
pub struct Identification {
    directory: PathBuf,
    file: RecordFile,
    record: IdentificationRecord,
    photos: Vec<PathBuf>,
}

impl Identification {
    /// Discovers an existing identification directory
    ///
    /// The first JSON file that decodes is the metadata source; later JSON
    /// files are ignored. Photos are collected in listing order.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let mut source: Option<(RecordFile, IdentificationRecord)> = None;
        let mut photos = Vec::new();

        for path in list_entries(&directory)? {
            if is_photo(&path) {
                photos.push(path);
            } else if source.is_none() && is_record_file(&path) {
                let file = RecordFile::new(&path);
                match file.load::<IdentificationRecord>() {
                    Ok(record) => source = Some((file, record)),
                    Err(e) => error!("Invalid JSON file {:?}: {}", path, e),
                }
            }
        }

        let Some((file, record)) = source else {
            return Err(RecordError::InvalidRecordDirectory(directory));
        };
        if photos.is_empty() {
            warn!("No identification photo found in {:?}", directory);
        }
        debug!(
            "Loaded identification {} with {} photo(s)",
            record.date,
            photos.len()
        );

        Ok(Self {
            directory,
            file,
            record,
            photos,
        })
    }

    /// Creates a new identification directory under `species_directory`
    ///
    /// Rejected when a sibling already has the same date or when the target
    /// directory is already on disk; nothing is created in either case.
    pub fn create<P: AsRef<Path>>(
        species_directory: P,
        siblings: &[Identification],
        record: IdentificationRecord,
    ) -> Result<Self> {
        record.validate()?;

        if siblings.iter().any(|s| s.record.date == record.date) {
            return Err(RecordError::DuplicateDate(record.date.to_string()));
        }

        let directory = species_directory
            .as_ref()
            .join(record.date.directory_name());
        if directory.exists() {
            return Err(RecordError::DirectoryAlreadyExists(directory));
        }
        fs::create_dir(&directory).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                RecordError::DirectoryAlreadyExists(directory.clone())
            }
            _ => RecordError::io(&directory, e),
        })?;

        let file = RecordFile::new(directory.join(IDENTIFICATION_FILE_NAME));
        if let Err(e) = file.create(&record) {
            if let Err(cleanup) = fs::remove_dir_all(&directory) {
                warn!("Could not remove {:?}: {}", directory, cleanup);
            }
            return Err(e);
        }

        Ok(Self {
            directory,
            file,
            record,
            photos: Vec::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Directory name, used for ordering siblings
    pub fn directory_name(&self) -> String {
        self.directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn record_path(&self) -> &Path {
        self.file.path()
    }

    pub fn record(&self) -> &IdentificationRecord {
        &self.record
    }

    pub fn photos(&self) -> &[PathBuf] {
        &self.photos
    }

    /// Opens a staging copy of the record for editing
    pub fn stage(&self) -> IdentificationForm {
        self.record.stage()
    }

    /// Writes the keys of `record` that differ from the current record
    ///
    /// Sibling dates and the directory name are the species' concern, see
    /// `Species::commit_identification`.
    pub(crate) fn commit_record(&mut self, record: &IdentificationRecord) -> Result<bool> {
        if !self.file.save_changes(&self.record, record)? {
            return Ok(false);
        }
        self.record = self.file.load()?;
        Ok(true)
    }

    /// Renames the identification directory to `target`
    pub(crate) fn relocate(&mut self, target: PathBuf) -> Result<()> {
        if target.exists() {
            return Err(RecordError::DirectoryAlreadyExists(target));
        }
        fs::rename(&self.directory, &target).map_err(|e| RecordError::io(&self.directory, e))?;
        debug!("Moved identification {:?} to {:?}", self.directory, target);

        let moved = |path: &Path| match path.file_name() {
            Some(name) => target.join(name),
            None => target.clone(),
        };
        self.file = RecordFile::new(moved(self.file.path()));
        self.photos = self.photos.iter().map(|p| moved(p.as_path())).collect();
        self.directory = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_form() -> IdentificationForm {
        IdentificationForm {
            day: "1".into(),
            month: "5".into(),
            year: "2024".into(),
            city: "Pau".into(),
            department: "Pyrénées-Atlantiques".into(),
            country: "France".into(),
            latitude: "43.3".into(),
            longitude: "-0.37".into(),
            altitude: "200".into(),
            description: "Bord de chemin".into(),
        }
    }

    fn write_identification(dir: &Path, name: &str, day: u32) {
        let content = json!({
            "identification": {
                "date": {"day": day, "month": 5, "year": 2024},
                "location": {
                    "city": "Pau", "department": "64", "country": "France",
                    "gps": {"latitude": 43.3, "longitude": -0.37, "altitude": 200}
                },
                "description": "test"
            }
        });
        fs::write(dir.join(name), serde_json::to_vec(&content).unwrap()).unwrap();
    }

    #[test]
    fn test_directory_name_from_date() {
        assert_eq!(ObservationDate::new(1, 5, 2024).directory_name(), "2024_05_01");
        assert_eq!(ObservationDate::new(31, 12, 999).directory_name(), "0999_12_31");
    }

    #[test]
    fn test_directory_name_invalid_date_sentinel() {
        for (day, month, year) in [(31, 2, 2024), (0, 1, 2024), (1, 13, 2024), (29, 2, 2023)] {
            let date = ObservationDate::new(day, month, year);
            assert_eq!(date.directory_name(), INVALID_DATE_DIRECTORY_NAME);
        }
        assert_eq!(ObservationDate::new(29, 2, 2024).directory_name(), "2024_02_29");
    }

    #[test]
    fn test_decode_out_of_range_gps_stored_as_zero() {
        let raw = json!({
            "identification": {
                "date": {"day": 1, "month": 5, "year": 2024},
                "location": {
                    "city": "Pau", "department": "64", "country": "France",
                    "gps": {"latitude": 95.0, "longitude": "12.5", "altitude": -4}
                }
            }
        });
        let record = IdentificationRecord::decode(&serde_json::to_vec(&raw).unwrap()).unwrap();
        assert_eq!(record.location.gps.latitude, 0.0);
        assert_eq!(record.location.gps.longitude, 12.5);
        assert_eq!(record.location.gps.altitude, 0);
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_decode_missing_gps_keys() {
        let raw = json!({
            "identification": {
                "date": {"day": 1, "month": 5, "year": 2024},
                "location": {"city": "Pau", "department": "64", "country": "France", "gps": {}}
            }
        });
        let err = IdentificationRecord::decode(&serde_json::to_vec(&raw).unwrap()).unwrap_err();
        match err {
            RecordError::MissingRequiredKeys(keys) => assert_eq!(keys.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_form_coordinate_bounds() {
        for value in ["90", "-90", "0", "45.5", ""] {
            let mut form = sample_form();
            form.latitude = value.into();
            form.longitude = value.into();
            assert!(form.validate().is_ok(), "{value} should be accepted");
        }
        for value in ["90.01", "-91", "abc", "NaN", "inf"] {
            let mut form = sample_form();
            form.latitude = value.into();
            match form.validate().unwrap_err() {
                RecordError::ValidationFailed(fields) => assert_eq!(fields, vec!["latitude"]),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_form_reports_every_invalid_field() {
        let mut form = sample_form();
        form.city = "  ".into();
        form.country = String::new();
        form.altitude = "-3".into();
        form.day = "30".into();
        form.month = "2".into();
        match form.validate().unwrap_err() {
            RecordError::ValidationFailed(fields) => {
                assert_eq!(fields, vec!["date", "city", "country", "altitude"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_open_without_json_fails() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("photo.jpg"), b"").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();

        let err = Identification::open(temp_dir.path()).unwrap_err();
        assert!(matches!(err, RecordError::InvalidRecordDirectory(_)));
    }

    #[test]
    fn test_open_with_only_broken_json_fails() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("identification.json"), b"{oops").unwrap();

        let err = Identification::open(temp_dir.path()).unwrap_err();
        assert!(matches!(err, RecordError::InvalidRecordDirectory(_)));
    }

    #[test]
    fn test_open_uses_first_valid_json_and_collects_photos() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.json"), b"not json").unwrap();
        write_identification(temp_dir.path(), "b.json", 1);
        write_identification(temp_dir.path(), "c.json", 2);
        fs::write(temp_dir.path().join("2.jpg"), b"").unwrap();
        fs::write(temp_dir.path().join("1.JPG"), b"").unwrap();
        fs::write(temp_dir.path().join("raw.png"), b"").unwrap();

        let identification = Identification::open(temp_dir.path()).unwrap();
        assert_eq!(identification.record().date.day, 1);
        assert!(identification.record_path().ends_with("b.json"));
        let names: Vec<_> = identification
            .photos()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1.JPG", "2.jpg"]);
    }

    #[test]
    fn test_create_writes_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let record = sample_form().validate().unwrap();

        let created = Identification::create(temp_dir.path(), &[], record.clone()).unwrap();
        assert_eq!(created.directory(), temp_dir.path().join("2024_05_01"));
        assert!(created.record_path().ends_with("2024_05_01/identification.json"));

        let reopened = Identification::open(created.directory()).unwrap();
        assert_eq!(reopened.record(), &record);
    }

    #[test]
    fn test_create_rejects_duplicate_date() {
        let temp_dir = TempDir::new().unwrap();
        let record = sample_form().validate().unwrap();
        let first = Identification::create(temp_dir.path(), &[], record.clone()).unwrap();

        // Remove the directory so only the sibling check can catch the duplicate
        fs::remove_dir_all(first.directory()).unwrap();

        let err = Identification::create(temp_dir.path(), &[first], record).unwrap_err();
        assert!(matches!(err, RecordError::DuplicateDate(_)));
        assert!(!temp_dir.path().join("2024_05_01").exists());
    }

    #[test]
    fn test_create_rejects_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("2024_05_01")).unwrap();
        let record = sample_form().validate().unwrap();

        let err = Identification::create(temp_dir.path(), &[], record).unwrap_err();
        assert!(matches!(err, RecordError::DirectoryAlreadyExists(_)));
        assert!(!temp_dir
            .path()
            .join("2024_05_01")
            .join(IDENTIFICATION_FILE_NAME)
            .exists());
    }

    #[test]
    fn test_commit_record_rewrites_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut identification =
            Identification::create(temp_dir.path(), &[], sample_form().validate().unwrap())
                .unwrap();

        let mut form = identification.stage();
        assert!(!identification.commit_record(&form.validate().unwrap()).unwrap());

        form.city = "Lourdes".into();
        form.altitude = "420".into();
        assert!(identification.commit_record(&form.validate().unwrap()).unwrap());
        assert_eq!(identification.record().location.city, "Lourdes");

        let reopened = Identification::open(identification.directory()).unwrap();
        assert_eq!(reopened.record().location.city, "Lourdes");
        assert_eq!(reopened.record().location.gps.altitude, 420);
    }

    #[test]
    fn test_relocate_moves_record_and_photos() {
        let temp_dir = TempDir::new().unwrap();
        let record = sample_form().validate().unwrap();
        fs::create_dir(temp_dir.path().join("2024_05_01")).unwrap();
        write_identification(&temp_dir.path().join("2024_05_01"), IDENTIFICATION_FILE_NAME, 1);
        fs::write(temp_dir.path().join("2024_05_01/fleur.jpg"), b"").unwrap();
        let mut identification = Identification::open(temp_dir.path().join("2024_05_01")).unwrap();

        let target = temp_dir.path().join("2024_06_01");
        identification.relocate(target.clone()).unwrap();
        assert_eq!(identification.directory(), target);
        assert!(identification.record_path().starts_with(&target));
        assert!(identification.photos()[0].starts_with(&target));
        assert!(!temp_dir.path().join("2024_05_01").exists());

        fs::create_dir(temp_dir.path().join("2024_07_01")).unwrap();
        let err = identification
            .relocate(temp_dir.path().join("2024_07_01"))
            .unwrap_err();
        assert!(matches!(err, RecordError::DirectoryAlreadyExists(_)));
        assert_eq!(identification.directory(), target);
        assert_eq!(identification.record().date, record.date);
    }
}
