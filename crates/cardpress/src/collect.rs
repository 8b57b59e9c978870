//! Card collection from a tree of source modules.
//!
//! The tree is laid out as `<serie>/<set>/<localId>.ts`. Only files exactly
//! three levels below the root are card entry points; shallower modules (the
//! set and serie definitions) are reached through imports.

use std::path::{Path, PathBuf};
use std::time::Instant;

use cardpress_modules::{ModuleEvaluator, ModuleRuntime};
use cardpress_schema::{CardRecord, PackFields, SET_FIELD};
use serde_json::{Map, Value};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dates::{iso, parse_release_date};
use crate::error::{CompileError, Result};

/// Depth of card modules below the tree root.
const CARD_DEPTH: usize = 3;

const CARD_EXTENSION: &str = "ts";

/// Why an evaluated module did not become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The default export is not a mapping.
    NotRecord,
    /// `set` is missing or not a mapping.
    MissingSet,
    /// `set.id` is missing or not a string.
    InvalidSetId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Accepted(CardRecord),
    Skipped(SkipReason),
}

/// Accepted records with their pack fields, plus the skip count.
#[derive(Debug, Default)]
pub struct Collection {
    pub cards: Vec<(CardRecord, PackFields)>,
    pub files: usize,
    pub skipped: usize,
}

/// Card entry points under `root`, sorted by path.
pub fn card_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(CompileError::configuration(format!(
            "module tree not found: {}",
            root.display()
        )));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(CARD_DEPTH).max_depth(CARD_DEPTH) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            CompileError::io(&path, e.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == CARD_EXTENSION) {
            files.push(path.to_path_buf());
        }
    }
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

/// Classify the value of the card module whose file stem is `local_id`.
pub fn classify(value: Value, local_id: &str) -> RecordOutcome {
    let Some(mut record) = CardRecord::from_value(value) else {
        return RecordOutcome::Skipped(SkipReason::NotRecord);
    };
    let set_id = match record.get(SET_FIELD) {
        Some(Value::Object(set)) => match set.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => return RecordOutcome::Skipped(SkipReason::InvalidSetId),
        },
        _ => return RecordOutcome::Skipped(SkipReason::MissingSet),
    };
    record.insert("id", Value::String(format!("{set_id}-{local_id}")));
    record.insert("number", Value::String(local_id.to_string()));
    RecordOutcome::Accepted(record)
}

/// Localized text: a string as-is, else a mapping's `en` entry, else its
/// first string entry.
pub fn pick_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => match map.get("en") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => map.values().find_map(|v| v.as_str().map(str::to_string)),
        },
        _ => None,
    }
}

/// `images.small` if a string; with `fallback`, the `image` string.
pub fn image_url(record: &CardRecord, fallback: bool) -> Option<String> {
    let small = record
        .get("images")
        .and_then(Value::as_object)
        .and_then(|images| images.get("small"))
        .and_then(Value::as_str);
    let direct = || record.get("image").and_then(Value::as_str).filter(|_| fallback);
    small.or_else(direct).map(str::to_string)
}

/// Pack fields of a module record, read from its nested `set`.
pub fn module_pack_fields(record: &CardRecord) -> PackFields {
    let empty = Map::new();
    let set = record
        .get(SET_FIELD)
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let serie_name = set
        .get("serie")
        .and_then(Value::as_object)
        .and_then(|serie| serie.get("name"));
    let release_date = match set.get("releaseDate") {
        Some(Value::Object(_)) => pick_text(set.get("releaseDate")).map(Value::String),
        other => other.cloned(),
    };
    PackFields {
        name: pick_text(set.get("name")),
        series: pick_text(serie_name),
        code: set.get("tcgOnline").and_then(Value::as_str).map(str::to_string),
        release_date: release_date.as_ref().and_then(parse_release_date).map(iso),
        image_url: image_url(record, true),
    }
}

/// Evaluates every card module of a tree through one runtime pass.
pub struct CardCollector<R: ModuleRuntime> {
    evaluator: ModuleEvaluator<R>,
}

impl<R: ModuleRuntime> CardCollector<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            evaluator: ModuleEvaluator::new(runtime),
        }
    }

    pub fn collect(&mut self, root: &Path) -> Result<Collection> {
        let start = Instant::now();
        let files = card_files(root)?;
        if files.is_empty() {
            return Err(CompileError::configuration(format!(
                "no card modules found under {}",
                root.display()
            )));
        }
        info!(root = %root.display(), files = files.len(), "evaluating card modules");

        let values = self.evaluator.evaluate_all(&files)?;

        let mut collection = Collection {
            files: files.len(),
            ..Collection::default()
        };
        for (path, value) in files.iter().zip(values) {
            let local_id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match classify(value, &local_id) {
                RecordOutcome::Accepted(record) => {
                    let pack = module_pack_fields(&record);
                    collection.cards.push((record, pack));
                }
                RecordOutcome::Skipped(reason) => {
                    debug!(path = %path.display(), ?reason, "skipping module");
                    collection.skipped += 1;
                }
            }
        }

        info!(
            cards = collection.cards.len(),
            skipped = collection.skipped,
            modules = self.evaluator.graph().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "collected cards"
        );
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_assigns_id_and_number() {
        let value = json!({"id": "old", "name": {"en": "Alakazam"}, "set": {"id": "base1"}});
        let RecordOutcome::Accepted(record) = classify(value, "1") else {
            panic!("expected record");
        };
        assert_eq!(record.id(), Some(&json!("base1-1")));
        let keys: Vec<_> = record.fields().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "name", "set", "number"]);
    }

    #[test]
    fn test_classify_skip_reasons() {
        assert_eq!(
            classify(json!("text"), "1"),
            RecordOutcome::Skipped(SkipReason::NotRecord)
        );
        assert_eq!(
            classify(json!({"name": "x"}), "1"),
            RecordOutcome::Skipped(SkipReason::MissingSet)
        );
        assert_eq!(
            classify(json!({"set": "base1"}), "1"),
            RecordOutcome::Skipped(SkipReason::MissingSet)
        );
        assert_eq!(
            classify(json!({"set": {"id": 4}}), "1"),
            RecordOutcome::Skipped(SkipReason::InvalidSetId)
        );
    }

    #[test]
    fn test_pick_text_prefers_english() {
        assert_eq!(pick_text(Some(&json!("Base"))), Some("Base".into()));
        assert_eq!(pick_text(Some(&json!({"fr": "Base FR", "en": "Base"}))), Some("Base".into()));
        assert_eq!(pick_text(Some(&json!({"fr": "Base FR", "de": "Grund"}))), Some("Base FR".into()));
        assert_eq!(pick_text(Some(&json!({"en": 1}))), None);
        assert_eq!(pick_text(None), None);
    }

    #[test]
    fn test_module_pack_fields() {
        let record = CardRecord::from_value(json!({
            "id": "base1-1",
            "image": "https://assets/base1/1",
            "set": {
                "id": "base1",
                "name": {"en": "Base Set", "fr": "Set de Base"},
                "serie": {"id": "base", "name": {"en": "Base"}},
                "tcgOnline": "BS",
                "releaseDate": {"en": "1999/01/09", "fr": "1999-06-16"}
            }
        }))
        .unwrap();
        assert_eq!(
            module_pack_fields(&record),
            PackFields {
                name: Some("Base Set".into()),
                series: Some("Base".into()),
                code: Some("BS".into()),
                release_date: Some("1999-01-09".into()),
                image_url: Some("https://assets/base1/1".into()),
            }
        );
    }

    #[test]
    fn test_image_url_prefers_small() {
        let record = CardRecord::from_value(json!({
            "images": {"small": "s.png"},
            "image": "i.png"
        }))
        .unwrap();
        assert_eq!(image_url(&record, true).as_deref(), Some("s.png"));
        let record = CardRecord::from_value(json!({"image": "i.png"})).unwrap();
        assert_eq!(image_url(&record, false), None);
    }

    #[test]
    fn test_card_files_depth_three_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        for rel in ["Base.ts", "Base/Base Set.ts", "Base/Base Set/2.ts", "Base/Base Set/1.ts", "Base/Base Set/x/3.ts", "Base/Base Set/notes.md"] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "export default {}\n").unwrap();
        }
        let files = card_files(root).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["Base/Base Set/1.ts", "Base/Base Set/2.ts"]);
    }
}
