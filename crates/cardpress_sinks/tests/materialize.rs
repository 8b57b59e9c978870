//! Materializer behavior against real SQLite files.

use std::path::Path;

use cardpress_schema::{infer, CardRecord, InferenceConfig, PackFields, Schema};
use cardpress_sinks::{SinkError, SqliteMaterializer};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;

fn corpus(values: Vec<Value>) -> Vec<(CardRecord, PackFields)> {
    values
        .into_iter()
        .map(|v| {
            let pack = PackFields {
                name: Some("Base Set".to_string()),
                series: Some("Base".to_string()),
                release_date: Some("1999-01-09".to_string()),
                ..PackFields::default()
            };
            (CardRecord::from_value(v).unwrap(), pack)
        })
        .collect()
}

fn schema_for(rows: &[(CardRecord, PackFields)]) -> Schema {
    infer(rows.iter().map(|(r, _)| r), InferenceConfig::flat()).unwrap()
}

fn write(path: &Path, rows: &[(CardRecord, PackFields)]) -> Result<u64, SinkError> {
    let schema = schema_for(rows);
    SqliteMaterializer::new(path).write(&schema, rows.iter().map(|(r, p)| (r, p)))
}

fn dump(path: &Path) -> Vec<Vec<SqlValue>> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn.prepare("SELECT * FROM cards ORDER BY id").unwrap();
    let width = stmt.column_count();
    let rows: Vec<Vec<SqlValue>> = stmt
        .query_map([], |row| (0..width).map(|i| row.get::<_, SqlValue>(i)).collect())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    rows
}

#[test]
fn test_duplicate_id_leaves_no_artifact() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cards.sqlite");
    let rows = corpus(vec![
        json!({"id": "base1-1", "name": "Alakazam"}),
        json!({"id": "base1-1", "name": "Blastoise"}),
    ]);

    let err = write(&path, &rows).unwrap_err();
    match err {
        SinkError::DuplicateId { id } => assert_eq!(id, "base1-1"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!path.exists());
    assert!(!tmp.path().join("cards.sqlite.partial").exists());
}

#[test]
fn test_failed_run_removes_previous_artifact() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cards.sqlite");
    write(&path, &corpus(vec![json!({"id": "a"})])).unwrap();
    assert!(path.exists());

    let rows = corpus(vec![json!({"id": "a"}), json!({"id": "b", "x": 1}), json!({"x": 2})]);
    let err = write(&path, &rows).unwrap_err();
    assert!(matches!(err, SinkError::MissingId { row: 2 }));
    assert!(!path.exists());
}

#[test]
fn test_rerun_produces_identical_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cards.sqlite");
    let rows = corpus(vec![
        json!({"id": "base1-2", "hp": 100, "attacks": [{"name": "Hydro Pump", "cost": ["Water"]}]}),
        json!({"id": "base1-1", "hp": 80, "types": ["Psychic"]}),
    ]);

    assert_eq!(write(&path, &rows).unwrap(), 2);
    let first = dump(&path);
    assert_eq!(write(&path, &rows).unwrap(), 2);
    assert_eq!(dump(&path), first);
}

#[test]
fn test_drift_and_native_storage() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cards.sqlite");
    let attacks = json!([{"name": "Confuse Ray", "cost": ["Psychic", "Psychic", "Psychic"], "damage": "30"}]);
    let rows = corpus(vec![
        json!({"id": "a", "hp": 60, "level": 1, "attacks": attacks.clone(), "rare": true}),
        json!({"id": "b", "hp": "60", "level": 2, "rare": false}),
    ]);
    write(&path, &rows).unwrap();

    let conn = Connection::open(&path).unwrap();
    let hp_types: Vec<(String, String)> = conn
        .prepare("SELECT hp, typeof(hp) FROM cards ORDER BY id")
        .unwrap()
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        hp_types,
        vec![("60".to_string(), "text".to_string()), ("60".to_string(), "text".to_string())]
    );

    let level_type: String = conn
        .query_row("SELECT typeof(level) FROM cards WHERE id = 'a'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(level_type, "integer");

    let rare: i64 = conn
        .query_row("SELECT rare FROM cards WHERE id = 'a'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rare, 1);

    let text: String = conn
        .query_row("SELECT attacks FROM cards WHERE id = 'a'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), attacks);

    let (pack, date): (String, String) = conn
        .query_row("SELECT packName, releaseDate FROM cards WHERE id = 'b'", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .unwrap();
    assert_eq!(pack, "Base Set");
    assert_eq!(date, "1999-01-09");
}
