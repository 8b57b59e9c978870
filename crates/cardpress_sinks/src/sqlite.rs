//! SQLite materializer for the `cards` table.
//!
//! The artifact is disposable: every run deletes the old file and builds a
//! new one from nothing. Rows are written to a sibling staging file
//! (`<name>.partial`) inside a single transaction, and the staging file is
//! renamed over the destination only after commit and `VACUUM` succeed. A
//! failed run leaves neither a staging file nor an artifact behind.

use std::path::{Path, PathBuf};
use std::time::Instant;

use cardpress_schema::{encode_row, CardRecord, PackFields, Schema, SqlScalar};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use tracing::{debug, info, warn};

use crate::error::{Result, SinkError};

/// Name of the single table in the artifact.
pub const TABLE_NAME: &str = "cards";

const STAGING_SUFFIX: &str = "partial";

/// Bulk-load settings. The file is rebuilt from scratch, so durability is
/// traded for speed; the rollback journal stays in memory so a failed
/// insert can still be rolled back.
const BULK_LOAD_PRAGMAS: &str = "PRAGMA journal_mode = MEMORY;
PRAGMA synchronous = OFF;
PRAGMA temp_store = MEMORY;
PRAGMA locking_mode = EXCLUSIVE;";

#[derive(Debug, Clone)]
pub struct SqliteMaterializer {
    path: PathBuf,
    table: String,
}

impl SqliteMaterializer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: TABLE_NAME.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the artifact is built in.
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(STAGING_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Replace the artifact with `records` laid out by `schema`. Returns the
    /// number of rows written.
    pub fn write<'a, I>(&self, schema: &Schema, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = (&'a CardRecord, &'a PackFields)>,
    {
        let start = Instant::now();
        self.prepare_destination()?;

        let staging = Staging::new(self.staging_path());
        let conn = Connection::open(staging.path())?;
        conn.execute_batch(BULK_LOAD_PRAGMAS)?;

        let create_sql = create_table_sql(&self.table, schema);
        debug!("CREATE TABLE: {}", create_sql);
        conn.execute(&create_sql, [])?;

        let rows = self.insert_all(&conn, schema, records)?;

        conn.execute_batch("VACUUM")?;
        conn.close().map_err(|(_, e)| SinkError::Sqlite(e))?;

        staging.commit(&self.path)?;
        info!(
            path = %self.path.display(),
            rows,
            columns = schema.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "materialized card table"
        );
        Ok(rows)
    }

    /// Remove the artifact and any leftover staging file.
    pub fn discard(&self) -> Result<()> {
        for stale in [self.path.clone(), self.staging_path()] {
            match std::fs::remove_file(&stale) {
                Ok(()) => debug!(path = %stale.display(), "removed previous file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SinkError::io(stale, e)),
            }
        }
        Ok(())
    }

    /// Delete any previous artifact and leftover staging file, and create
    /// the parent directory.
    fn prepare_destination(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
        }
        self.discard()
    }

    fn insert_all<'a, I>(&self, conn: &Connection, schema: &Schema, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = (&'a CardRecord, &'a PackFields)>,
    {
        let insert_sql = insert_sql(&self.table, schema);
        let tx = conn.unchecked_transaction()?;
        let mut rows = 0u64;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for (index, (record, pack)) in records.into_iter().enumerate() {
                let row = encode_row(schema, record, pack);
                let id = &row[0];
                if id.is_null() {
                    return Err(SinkError::MissingId { row: index });
                }
                stmt.execute(params_from_iter(row.iter().map(to_sql)))
                    .map_err(|e| classify_insert_error(e, id))?;
                rows += 1;
            }
        }
        tx.commit()?;
        Ok(rows)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| {
            let constraint = if c.is_primary_key() {
                " NOT NULL PRIMARY KEY"
            } else {
                ""
            };
            format!("{} {}{}", quote_ident(&c.name), c.kind.sql_type(), constraint)
        })
        .collect();
    format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", "))
}

fn insert_sql(table: &str, schema: &Schema) -> String {
    let columns: Vec<String> = schema.names().map(quote_ident).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders
    )
}

fn to_sql(value: &SqlScalar) -> ToSqlOutput<'_> {
    ToSqlOutput::Borrowed(match value {
        SqlScalar::Null => ValueRef::Null,
        SqlScalar::Integer(i) => ValueRef::Integer(*i),
        SqlScalar::Real(r) => ValueRef::Real(*r),
        SqlScalar::Text(s) => ValueRef::Text(s.as_bytes()),
    })
}

fn classify_insert_error(err: rusqlite::Error, id: &SqlScalar) -> SinkError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => SinkError::DuplicateId { id: id.to_string() },
        _ => SinkError::Sqlite(err),
    }
}

/// Staging file that is removed on drop unless committed.
struct Staging {
    path: PathBuf,
    committed: bool,
}

impl Staging {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self, dest: &Path) -> Result<()> {
        std::fs::rename(&self.path, dest).map_err(|e| SinkError::io(dest, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if self.committed || !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => warn!("Removed incomplete artifact: {}", self.path.display()),
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardpress_schema::{infer, InferenceConfig};
    use serde_json::json;
    use tempfile::TempDir;

    fn records(values: Vec<serde_json::Value>) -> Vec<(CardRecord, PackFields)> {
        values
            .into_iter()
            .map(|v| (CardRecord::from_value(v).unwrap(), PackFields::default()))
            .collect()
    }

    #[test]
    fn test_staging_path_is_sibling() {
        let sink = SqliteMaterializer::new("/data/cards.sqlite");
        assert_eq!(sink.staging_path(), PathBuf::from("/data/cards.sqlite.partial"));
    }

    #[test]
    fn test_create_table_declares_primary_key() {
        let rows = records(vec![json!({"id": "a", "hp": 60, "name": "A"})]);
        let schema = infer(rows.iter().map(|(r, _)| r), InferenceConfig::flat()).unwrap();
        assert_eq!(
            create_table_sql("cards", &schema),
            "CREATE TABLE \"cards\" (\"id\" TEXT NOT NULL PRIMARY KEY, \"hp\" INTEGER, \"name\" TEXT, \
             \"packName\" TEXT, \"packSeries\" TEXT, \"releaseDate\" DATE, \"imageUrl\" TEXT)"
        );
    }

    #[test]
    fn test_write_creates_parent_and_replaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/cards.sqlite");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"stale").unwrap();

        let rows = records(vec![json!({"id": "a"}), json!({"id": "b"})]);
        let schema = infer(rows.iter().map(|(r, _)| r), InferenceConfig::flat()).unwrap();
        let sink = SqliteMaterializer::new(&path);
        let written = sink.write(&schema, rows.iter().map(|(r, p)| (r, p))).unwrap();

        assert_eq!(written, 2);
        assert!(!sink.staging_path().exists());
        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM cards", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_discard_tolerates_missing_files() {
        let tmp = TempDir::new().unwrap();
        let sink = SqliteMaterializer::new(tmp.path().join("cards.sqlite"));
        sink.discard().unwrap();

        std::fs::write(sink.path(), b"old").unwrap();
        std::fs::write(sink.staging_path(), b"half").unwrap();
        sink.discard().unwrap();
        assert!(!sink.path().exists());
        assert!(!sink.staging_path().exists());
    }
}
