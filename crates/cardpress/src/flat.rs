//! Flat-file corpora: one JSON list of cards per set.

use std::path::{Path, PathBuf};

use cardpress_schema::{CardRecord, PackFields};
use serde_json::Value;
use tracing::{debug, warn};

use crate::collect::image_url;
use crate::dates::iso;
use crate::error::{CompileError, Result};
use crate::sets::SetCatalog;

/// `*.json` files directly inside `dir`, sorted.
pub fn list_card_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CompileError::configuration(format!(
            "cards directory not found: {}",
            dir.display()
        )));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| CompileError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CompileError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read one set file. Every element must be an object.
pub fn read_card_file(path: &Path) -> Result<Vec<CardRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    if text.trim().is_empty() {
        return Err(CompileError::configuration(format!(
            "card file is empty: {}",
            path.display()
        )));
    }
    let payload: Value = serde_json::from_str(&text).map_err(|e| CompileError::json(path, e))?;
    let Value::Array(items) = payload else {
        return Err(CompileError::invalid_input(path, "expected a list of cards"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            CardRecord::from_value(item).ok_or_else(|| {
                CompileError::invalid_input(path, format!("element {index} is not an object"))
            })
        })
        .collect()
}

/// Load every card under `dir`, paired with pack fields from `catalog`.
pub fn load_cards(dir: &Path, catalog: &SetCatalog) -> Result<Vec<(CardRecord, PackFields)>> {
    let files = list_card_files(dir)?;
    if files.is_empty() {
        return Err(CompileError::configuration(format!(
            "no JSON files found in {}",
            dir.display()
        )));
    }
    load_files(&files, catalog)
}

/// Load the cards of `files`; each file stem names its set.
pub fn load_files(files: &[PathBuf], catalog: &SetCatalog) -> Result<Vec<(CardRecord, PackFields)>> {
    let mut cards = Vec::new();
    for path in files {
        let set_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let set = catalog.get(&set_id);
        if set.is_none() {
            warn!(set = %set_id, "set missing from catalog, pack columns left empty");
        }

        let records = read_card_file(path)?;
        debug!(path = %path.display(), cards = records.len(), "read set file");
        for record in records {
            let pack = PackFields {
                name: set.and_then(|s| s.name.clone()),
                series: set.and_then(|s| s.series.clone()),
                code: None,
                release_date: set.and_then(|s| s.release_date).map(iso),
                image_url: image_url(&record, false),
            };
            cards.push((record, pack));
        }
    }
    Ok(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_lists_only_json_files_sorted() {
        let tmp = TempDir::new().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            fs::write(tmp.path().join(name), "[]").unwrap();
        }
        fs::create_dir(tmp.path().join("nested.json")).unwrap();

        let files = list_card_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_non_list_file_is_invalid_input() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("base1.json");
        fs::write(&path, r#"{"id": "base1-1"}"#).unwrap();
        assert!(matches!(
            read_card_file(&path).unwrap_err(),
            CompileError::InvalidInput { .. }
        ));

        fs::write(&path, r#"[{"id": "base1-1"}, 3]"#).unwrap();
        assert!(matches!(
            read_card_file(&path).unwrap_err(),
            CompileError::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_empty_card_file_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("base1.json");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            read_card_file(&path).unwrap_err(),
            CompileError::Configuration(_)
        ));
    }

    #[test]
    fn test_pack_fields_come_from_catalog_and_images() {
        let tmp = TempDir::new().unwrap();
        let cards_dir = tmp.path().join("cards");
        fs::create_dir(&cards_dir).unwrap();
        fs::write(
            cards_dir.join("base1.json"),
            json!([
                {"id": "base1-1", "images": {"small": "https://img/1.png", "large": "x"}},
                {"id": "base1-2", "images": {"small": 7}}
            ])
            .to_string(),
        )
        .unwrap();
        let sets = tmp.path().join("en.json");
        fs::write(
            &sets,
            json!([{"id": "base1", "name": "Base", "series": "Base", "releaseDate": "1999/01/09"}]).to_string(),
        )
        .unwrap();

        let catalog = SetCatalog::load(&sets).unwrap();
        let cards = load_cards(&cards_dir, &catalog).unwrap();
        assert_eq!(cards.len(), 2);
        let (_, pack) = &cards[0];
        assert_eq!(pack.name.as_deref(), Some("Base"));
        assert_eq!(pack.release_date.as_deref(), Some("1999-01-09"));
        assert_eq!(pack.image_url.as_deref(), Some("https://img/1.png"));
        assert!(pack.code.is_none());
        assert!(cards[1].1.image_url.is_none());
    }

    #[test]
    fn test_empty_directory_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_cards(tmp.path(), &SetCatalog::default()).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
    }
}
