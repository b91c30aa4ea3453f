use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::AnnotationParseError;

/// Mapping from integer mask labels to class names.
///
/// Loaded from a JSON object such as `{"1": "tumor", "2": "stroma"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    names: BTreeMap<u32, String>,
}

/// A label map together with the entries that were rejected while loading it.
#[derive(Debug, Clone)]
pub struct LoadedLabelMap {
    pub map: LabelMap,
    pub rejected: Vec<AnnotationParseError>,
}

impl LabelMap {
    /// Read and parse a label map file.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotationParseError::Malformed`] if the file cannot be read
    /// or is not a JSON object. Individual bad entries are collected in
    /// [`LoadedLabelMap::rejected`] instead.
    pub fn load(path: impl AsRef<Path>) -> Result<LoadedLabelMap, AnnotationParseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AnnotationParseError::Malformed {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&path.display().to_string(), &text)
    }

    /// Parse a label map from JSON text; `source_name` is used in errors.
    pub fn from_json_str(source_name: &str, text: &str) -> Result<LoadedLabelMap, AnnotationParseError> {
        let malformed = |message: String| AnnotationParseError::Malformed {
            source_name: source_name.to_string(),
            message,
        };

        let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(entries) = value else {
            return Err(malformed("expected a JSON object".to_string()));
        };

        let mut names = BTreeMap::new();
        let mut rejected = Vec::new();

        for (key, value) in entries {
            let label = match key.trim().parse::<u32>() {
                Ok(label) => label,
                Err(e) => {
                    rejected.push(AnnotationParseError::InvalidEntry {
                        key,
                        message: format!("key is not an integer label: {e}"),
                    });
                    continue;
                }
            };
            match value {
                Value::String(name) => {
                    names.insert(label, name);
                }
                other => rejected.push(AnnotationParseError::InvalidEntry {
                    key,
                    message: format!("expected a string class name, got {other}"),
                }),
            }
        }

        Ok(LoadedLabelMap {
            map: LabelMap { names },
            rejected,
        })
    }

    /// Class name of `label`, if mapped.
    pub fn name(&self, label: u32) -> Option<&str> {
        self.names.get(&label).map(String::as_str)
    }

    /// Class name of `label`, falling back to the integer itself.
    pub fn resolve(&self, label: u32) -> String {
        self.name(label)
            .map(str::to_string)
            .unwrap_or_else(|| label.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_map() {
        let loaded = LabelMap::from_json_str("m", r#"{"1": "tumor", "2": "stroma"}"#).unwrap();
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.map.len(), 2);
        assert_eq!(loaded.map.name(1), Some("tumor"));
        assert_eq!(loaded.map.resolve(2), "stroma");
        assert_eq!(loaded.map.resolve(9), "9");
    }

    #[test]
    fn test_bad_entries_are_collected() {
        let loaded =
            LabelMap::from_json_str("m", r#"{"1": "tumor", "x": "bad", "3": 4}"#).unwrap();
        assert_eq!(loaded.map.len(), 1);
        assert_eq!(loaded.rejected.len(), 2);
        assert!(loaded
            .rejected
            .iter()
            .any(|e| matches!(e, AnnotationParseError::InvalidEntry { key, .. } if key == "x")));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            LabelMap::from_json_str("m", "[1, 2]"),
            Err(AnnotationParseError::Malformed { .. })
        ));
        assert!(matches!(
            LabelMap::from_json_str("m", "{not json"),
            Err(AnnotationParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"0": "background"}"#).unwrap();

        let loaded = LabelMap::load(&path).unwrap();
        assert_eq!(loaded.map.name(0), Some("background"));
        assert!(LabelMap::load(dir.path().join("missing.json")).is_err());
    }
}
