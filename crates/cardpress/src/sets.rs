//! Set catalog for flat-file corpora.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::dates::parse_release_date;
use crate::error::{CompileError, Result};

/// Metadata of one set, as listed in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetInfo {
    pub name: Option<String>,
    pub series: Option<String>,
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct SetCatalog {
    sets: HashMap<String, SetInfo>,
}

impl SetCatalog {
    /// Read a JSON list of set objects keyed by their `id`. Nested lists are
    /// flattened.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CompileError::configuration(format!(
                "set catalog not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        if text.trim().is_empty() {
            return Err(CompileError::configuration(format!(
                "set catalog is empty: {}",
                path.display()
            )));
        }
        let payload: Value = serde_json::from_str(&text).map_err(|e| CompileError::json(path, e))?;
        let catalog = Self::from_value(path, payload)?;
        debug!(path = %path.display(), sets = catalog.len(), "loaded set catalog");
        Ok(catalog)
    }

    fn from_value(path: &Path, payload: Value) -> Result<Self> {
        if !matches!(payload, Value::Array(_) | Value::Object(_)) {
            return Err(CompileError::invalid_input(path, "set catalog is not a list"));
        }
        let mut entries = Vec::new();
        flatten_entries(payload, &mut entries);

        let mut sets = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let Value::Object(fields) = entry else {
                return Err(CompileError::invalid_input(
                    path,
                    format!("set entry {index} is not an object"),
                ));
            };
            let Some(id) = fields.get("id").and_then(Value::as_str) else {
                return Err(CompileError::invalid_input(
                    path,
                    format!("set entry {index} has no string id"),
                ));
            };
            let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
            let info = SetInfo {
                name: text("name"),
                series: text("series"),
                release_date: fields.get("releaseDate").and_then(parse_release_date),
            };
            sets.insert(id.to_string(), info);
        }
        Ok(Self { sets })
    }

    pub fn get(&self, id: &str) -> Option<&SetInfo> {
        self.sets.get(id)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Nested lists of sets are flattened in order; a lone object is one set.
fn flatten_entries(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_entries(item, out);
            }
        }
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_catalog() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("en.json");
        std::fs::write(
            &path,
            json!([
                {"id": "base1", "name": "Base", "series": "Base", "releaseDate": "1999/01/09"},
                {"id": "odd", "name": 5, "releaseDate": "someday"}
            ])
            .to_string(),
        )
        .unwrap();

        let catalog = SetCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        let base = catalog.get("base1").unwrap();
        assert_eq!(base.name.as_deref(), Some("Base"));
        assert_eq!(base.release_date, NaiveDate::from_ymd_opt(1999, 1, 9));
        assert_eq!(catalog.get("odd").unwrap(), &SetInfo::default());
    }

    #[test]
    fn test_missing_catalog_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let err = SetCatalog::load(&tmp.path().join("en.json")).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
    }

    #[test]
    fn test_non_list_catalog_is_invalid() {
        let err = SetCatalog::from_value(Path::new("en.json"), json!("base1")).unwrap_err();
        assert!(matches!(err, CompileError::InvalidInput { .. }));
    }

    #[test]
    fn test_nested_lists_are_flattened() {
        let payload = json!([
            [{"id": "base1", "name": "Base"}],
            [[{"id": "base2", "name": "Jungle"}], {"id": "base3", "name": "Fossil"}]
        ]);
        let catalog = SetCatalog::from_value(Path::new("en.json"), payload).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("base2").unwrap().name.as_deref(), Some("Jungle"));

        let single = SetCatalog::from_value(Path::new("en.json"), json!({"id": "base1"})).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_scalar_entry_is_invalid() {
        let err = SetCatalog::from_value(Path::new("en.json"), json!([[{"id": "a"}], 3])).unwrap_err();
        assert!(matches!(err, CompileError::InvalidInput { .. }));
    }

    #[test]
    fn test_empty_catalog_file_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("en.json");
        for text in ["", "  \n"] {
            std::fs::write(&path, text).unwrap();
            let err = SetCatalog::load(&path).unwrap_err();
            assert!(matches!(err, CompileError::Configuration(_)));
        }
    }
}
