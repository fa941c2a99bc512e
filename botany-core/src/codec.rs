//! Record codec
//!
//! Decodes a JSON document into the mapping stored under a record's
//! top-level key, checking every declared set of required keys on the way,
//! and encodes records back into self-describing pretty-printed JSON.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{RecordError, Result};

/// Keys that must be present in the object found at `path`
///
/// `path` is relative to the record mapping (the object under the top-level
/// key); an empty path designates the record mapping itself.
#[derive(Debug, Clone, Copy)]
pub struct KeySet {
    pub path: &'static [&'static str],
    pub keys: &'static [&'static str],
}

impl KeySet {
    pub const fn top(keys: &'static [&'static str]) -> Self {
        Self { path: &[], keys }
    }

    pub const fn nested(path: &'static [&'static str], keys: &'static [&'static str]) -> Self {
        Self { path, keys }
    }
}

/// A record kind persisted as one JSON file with a fixed top-level key
pub trait Record: Sized {
    /// Key wrapping the record content in the JSON document
    const TOP_LEVEL_KEY: &'static str;

    /// Required key sets, checked in order
    const REQUIRED_KEYS: &'static [KeySet];

    /// Builds the record from a decoded mapping, coercing each field
    fn from_mapping(mapping: &Map<String, Value>) -> Self;

    /// Renders every field, including zeros and empty strings
    fn to_mapping(&self) -> Map<String, Value>;

    fn decode(raw: &[u8]) -> Result<Self> {
        let mapping = decode(raw, Self::TOP_LEVEL_KEY, Self::REQUIRED_KEYS)?;
        Ok(Self::from_mapping(&mapping))
    }

    fn encode(&self) -> Result<Vec<u8>> {
        encode(Self::TOP_LEVEL_KEY, self.to_mapping())
    }

    /// Wraps the record mapping under its top-level key
    fn to_document(&self) -> Value {
        let mut document = Map::new();
        document.insert(
            Self::TOP_LEVEL_KEY.to_string(),
            Value::Object(self.to_mapping()),
        );
        Value::Object(document)
    }
}

/// Decodes `raw` and returns the mapping stored under `top_level_key`
///
/// Every key set is checked and all missing keys of the first failing set
/// are reported together.
pub fn decode(
    raw: &[u8],
    top_level_key: &str,
    required_key_sets: &[KeySet],
) -> Result<Map<String, Value>> {
    let document: Value = serde_json::from_slice(raw)?;

    let top = document
        .as_object()
        .and_then(|root| root.get(top_level_key))
        .ok_or_else(|| RecordError::MissingTopLevelKey(top_level_key.to_string()))?;
    let mapping = top
        .as_object()
        .ok_or_else(|| RecordError::InvalidShape(top_level_key.to_string()))?;

    for key_set in required_key_sets {
        check_key_set(mapping, key_set)?;
    }

    Ok(mapping.clone())
}

fn check_key_set(mapping: &Map<String, Value>, key_set: &KeySet) -> Result<()> {
    let mut object = mapping;
    for (depth, segment) in key_set.path.iter().enumerate() {
        let dotted = key_set.path[..=depth].join(".");
        match object.get(*segment) {
            Some(Value::Object(inner)) => object = inner,
            Some(_) => return Err(RecordError::InvalidShape(dotted)),
            None => return Err(RecordError::MissingRequiredKeys(vec![dotted])),
        }
    }

    let missing: Vec<String> = key_set
        .keys
        .iter()
        .filter(|key| !object.contains_key(**key))
        .map(|key| dotted_key(key_set.path, key))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RecordError::MissingRequiredKeys(missing))
    }
}

fn dotted_key(path: &[&str], key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path.join("."), key)
    }
}

/// Encodes `mapping` under `top_level_key`
pub fn encode(top_level_key: &str, mapping: Map<String, Value>) -> Result<Vec<u8>> {
    let mut document = Map::new();
    document.insert(top_level_key.to_string(), Value::Object(mapping));
    to_pretty_bytes(&Value::Object(document))
}

/// Serializes with four-space indentation and a trailing newline
pub fn to_pretty_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value
        .serialize(&mut serializer)
        .map_err(RecordError::Serialization)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deep-merges `update` into `target`: objects are merged key by key, any
/// other value replaces what was there.
pub fn merge(target: &mut Value, update: Value) {
    match (target, update) {
        (Value::Object(target), Value::Object(update)) => {
            for (key, value) in update {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, update) => *target = update,
    }
}

/// The parts of `current` that differ from `previous`, as a value that can
/// be merged over a document holding `previous`
///
/// Objects are compared key by key; `None` means nothing changed.
pub fn changes(previous: &Value, current: &Value) -> Option<Value> {
    match (previous, current) {
        (Value::Object(previous), Value::Object(current)) => {
            let mut changed = Map::new();
            for (key, value) in current {
                let delta = match previous.get(key) {
                    Some(old) => changes(old, value),
                    None => Some(value.clone()),
                };
                if let Some(delta) = delta {
                    changed.insert(key.clone(), delta);
                }
            }
            (!changed.is_empty()).then_some(Value::Object(changed))
        }
        (previous, current) if previous == current => None,
        (_, current) => Some(current.clone()),
    }
}

// =========================================================================
// Field coercion
// =========================================================================

/// Looks up a value following `path` through nested objects
pub(crate) fn lookup<'a>(mapping: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    let mut object = mapping;
    for segment in parents {
        object = object.get(*segment)?.as_object()?;
    }
    object.get(*last)
}

/// Renders a value as text; null and absent values become an empty string
pub(crate) fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Reads an integer from a number or a numeric string, 0 otherwise
pub(crate) fn integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Reads a float from a number or a numeric string, 0.0 otherwise
pub(crate) fn number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REQUIRED: &[KeySet] = &[
        KeySet::top(&["date", "location"]),
        KeySet::nested(&["location"], &["city", "gps"]),
        KeySet::nested(&["location", "gps"], &["latitude", "longitude"]),
    ];

    fn raw(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_decode_returns_nested_mapping() {
        let bytes = raw(json!({
            "entry": {
                "date": 1,
                "location": { "city": "Pau", "gps": { "latitude": 1, "longitude": 2 } }
            }
        }));
        let mapping = decode(&bytes, "entry", REQUIRED).unwrap();
        assert_eq!(text(lookup(&mapping, &["location", "city"])), "Pau");
        assert_eq!(integer(lookup(&mapping, &["location", "gps", "longitude"])), 2);
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode(b"{ not json", "entry", REQUIRED).unwrap_err();
        assert!(matches!(err, RecordError::MalformedJson(_)));
    }

    #[test]
    fn test_decode_missing_top_level_key() {
        let err = decode(&raw(json!({"other": {}})), "entry", REQUIRED).unwrap_err();
        assert!(matches!(err, RecordError::MissingTopLevelKey(key) if key == "entry"));

        let err = decode(&raw(json!([1, 2])), "entry", REQUIRED).unwrap_err();
        assert!(matches!(err, RecordError::MissingTopLevelKey(_)));
    }

    #[test]
    fn test_decode_invalid_shape() {
        let err = decode(&raw(json!({"entry": "text"})), "entry", REQUIRED).unwrap_err();
        assert!(matches!(err, RecordError::InvalidShape(key) if key == "entry"));

        let bytes = raw(json!({"entry": {"date": 1, "location": 5}}));
        let err = decode(&bytes, "entry", REQUIRED).unwrap_err();
        assert!(matches!(err, RecordError::InvalidShape(key) if key == "location"));
    }

    #[test]
    fn test_decode_lists_every_missing_key() {
        let err = decode(&raw(json!({"entry": {}})), "entry", REQUIRED).unwrap_err();
        match err {
            RecordError::MissingRequiredKeys(keys) => {
                assert_eq!(keys, vec!["date".to_string(), "location".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let bytes = raw(json!({"entry": {"date": 1, "location": {"city": "", "gps": {}}}}));
        match decode(&bytes, "entry", REQUIRED).unwrap_err() {
            RecordError::MissingRequiredKeys(keys) => assert_eq!(
                keys,
                vec!["location.gps.latitude", "location.gps.longitude"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_coercion() {
        assert_eq!(text(None), "");
        assert_eq!(text(Some(&Value::Null)), "");
        assert_eq!(text(Some(&json!(12))), "12");
        assert_eq!(integer(Some(&json!("42"))), 42);
        assert_eq!(integer(Some(&json!("abc"))), 0);
        assert_eq!(integer(Some(&json!(3.9))), 3);
        assert_eq!(number(Some(&json!("43.5"))), 43.5);
        assert_eq!(number(Some(&json!(true))), 0.0);
    }

    #[test]
    fn test_encode_uses_four_space_indent() {
        let mut mapping = Map::new();
        mapping.insert("name".into(), json!("x"));
        let bytes = encode("entry", mapping).unwrap();
        let rendered = String::from_utf8(bytes).unwrap();
        assert!(rendered.contains("\n    \"entry\": {\n        \"name\": \"x\""));
        assert!(rendered.ends_with("}\n"));
    }

    #[test]
    fn test_serialization_failure_is_not_malformed_json() {
        let mut map = std::collections::BTreeMap::new();
        map.insert((1, 2), "tuple keys are not JSON object keys");

        let err = to_pretty_bytes(&map).unwrap_err();
        assert!(matches!(err, RecordError::Serialization(_)));
    }

    #[test]
    fn test_changes_keeps_only_differing_leaves() {
        let previous = json!({"entry": {"a": "", "nested": {"x": 0, "y": 0}, "same": 1}});
        let current = json!({"entry": {"a": "new", "nested": {"x": 0, "y": 3}, "same": 1}});
        assert_eq!(
            changes(&previous, &current),
            Some(json!({"entry": {"a": "new", "nested": {"y": 3}}}))
        );
        assert_eq!(changes(&previous, &previous), None);
        assert_eq!(
            changes(&json!({"entry": {}}), &json!({"entry": {"added": 1}})),
            Some(json!({"entry": {"added": 1}}))
        );
    }

    #[test]
    fn test_merge_keeps_unknown_keys() {
        let mut target = json!({"entry": {"a": 1, "nested": {"x": 1, "y": 2}, "extra": true}});
        merge(&mut target, json!({"entry": {"a": 2, "nested": {"x": 5}}}));
        assert_eq!(
            target,
            json!({"entry": {"a": 2, "nested": {"x": 5, "y": 2}, "extra": true}})
        );
    }
}
