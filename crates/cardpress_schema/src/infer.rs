//! Corpus-wide schema inference.
//!
//! Every value of every record is observed; there is no sampling. A field
//! keeps a native storage kind only if all of its values share one
//! [`ValueKind`]. Any mix (including null next to a number) degrades the
//! column to text.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::{Result, SchemaError};
use crate::record::{CardRecord, ValueKind, ID_FIELD};
use crate::schema::{Column, ColumnKind, ColumnSource, DerivedField, Schema};

/// Fields never stored as columns, whatever the source.
pub const EXCLUDED_FIELDS: [&str; 5] = [
    "retreatCost",
    "flavorText",
    "legalities",
    "images",
    "nationalPokedexNumbers",
];

/// The nested set object carried by module records; its content is
/// flattened into derived columns instead.
pub const SET_FIELD: &str = "set";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    pub excluded: BTreeSet<String>,
    /// Derived columns appended after the record fields, in order.
    pub derived: Vec<DerivedField>,
}

impl InferenceConfig {
    /// Profile for records read from flat per-set JSON files.
    pub fn flat() -> Self {
        Self {
            excluded: EXCLUDED_FIELDS.iter().map(|s| s.to_string()).collect(),
            derived: vec![
                DerivedField::PackName,
                DerivedField::PackSeries,
                DerivedField::ReleaseDate,
                DerivedField::ImageUrl,
            ],
        }
    }

    /// Profile for records evaluated from source modules.
    pub fn modules() -> Self {
        let mut excluded: BTreeSet<String> = EXCLUDED_FIELDS.iter().map(|s| s.to_string()).collect();
        excluded.insert(SET_FIELD.to_string());
        Self {
            excluded,
            derived: vec![
                DerivedField::PackName,
                DerivedField::PackSeries,
                DerivedField::PackCode,
                DerivedField::ReleaseDate,
                DerivedField::ImageUrl,
            ],
        }
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.excluded.contains(field)
    }

    fn derived_named(&self, field: &str) -> bool {
        self.derived.iter().any(|d| d.column_name() == field)
    }
}

/// Accumulates observed kinds per field.
#[derive(Debug)]
pub struct SchemaInferencer {
    config: InferenceConfig,
    kinds: BTreeMap<String, BTreeSet<ValueKind>>,
    records: usize,
}

impl SchemaInferencer {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            kinds: BTreeMap::new(),
            records: 0,
        }
    }

    pub fn observe(&mut self, record: &CardRecord) -> Result<()> {
        for (field, value) in record.fields() {
            if self.config.is_excluded(field) {
                continue;
            }
            if self.config.derived_named(field) {
                return Err(SchemaError::ReservedColumn {
                    name: field.clone(),
                });
            }
            self.kinds
                .entry(field.clone())
                .or_default()
                .insert(ValueKind::of(value));
        }
        self.records += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<Schema> {
        let id_kinds = self.kinds.remove(ID_FIELD).ok_or(SchemaError::MissingId)?;

        let mut columns = Vec::with_capacity(self.kinds.len() + self.config.derived.len() + 1);
        columns.push(field_column(ID_FIELD.to_string(), &id_kinds, 0));
        for (name, kinds) in self.kinds {
            let ordinal = columns.len();
            columns.push(field_column(name, &kinds, ordinal));
        }
        for derived in &self.config.derived {
            columns.push(Column {
                name: derived.column_name().to_string(),
                kind: derived.kind(),
                ordinal: columns.len(),
                source: ColumnSource::Derived(*derived),
                drift: false,
            });
        }

        let schema = Schema::new(columns);
        let drifted: Vec<&str> = schema.drifted().map(|c| c.name.as_str()).collect();
        if !drifted.is_empty() {
            warn!(columns = ?drifted, "mixed value kinds, storing as TEXT");
        }
        debug!(
            records = self.records,
            columns = schema.len(),
            "schema inferred"
        );
        Ok(schema)
    }
}

fn field_column(name: String, kinds: &BTreeSet<ValueKind>, ordinal: usize) -> Column {
    let (kind, drift) = match kinds.iter().next() {
        Some(&only) if kinds.len() == 1 => (ColumnKind::for_value_kind(only), false),
        _ => (ColumnKind::Text, true),
    };
    Column {
        name,
        kind,
        ordinal,
        source: ColumnSource::Field,
        drift,
    }
}

/// Infer the schema of a whole corpus.
pub fn infer<'a>(
    records: impl IntoIterator<Item = &'a CardRecord>,
    config: InferenceConfig,
) -> Result<Schema> {
    let mut inferencer = SchemaInferencer::new(config);
    for record in records {
        inferencer.observe(record)?;
    }
    inferencer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CardRecord {
        CardRecord::from_value(value).unwrap()
    }

    fn summary(schema: &Schema) -> Vec<(String, &'static str, bool)> {
        schema
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.kind.sql_type(), c.drift))
            .collect()
    }

    #[test]
    fn test_flat_schema_order_and_kinds() {
        let records = vec![
            record(json!({"name": "Alakazam", "id": "base1-1", "hp": 80, "images": {"small": "a.png"}})),
            record(json!({"id": "base1-2", "name": "Blastoise", "hp": 100, "evolvesFrom": "Wartortle"})),
        ];
        let schema = infer(&records, InferenceConfig::flat()).unwrap();
        assert_eq!(
            summary(&schema),
            vec![
                ("id".to_string(), "TEXT", false),
                ("evolvesFrom".to_string(), "TEXT", false),
                ("hp".to_string(), "INTEGER", false),
                ("name".to_string(), "TEXT", false),
                ("packName".to_string(), "TEXT", false),
                ("packSeries".to_string(), "TEXT", false),
                ("releaseDate".to_string(), "DATE", false),
                ("imageUrl".to_string(), "TEXT", false),
            ]
        );
        let ordinals: Vec<usize> = schema.columns().iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_mixed_kinds_degrade_to_text() {
        let records = vec![
            record(json!({"id": "a", "hp": 60, "rare": true, "weight": 1.5})),
            record(json!({"id": "b", "hp": "60", "rare": false, "weight": null})),
        ];
        let schema = infer(&records, InferenceConfig::flat()).unwrap();
        let hp = schema.column("hp").unwrap();
        assert_eq!((hp.kind, hp.drift), (ColumnKind::Text, true));
        let rare = schema.column("rare").unwrap();
        assert_eq!((rare.kind, rare.drift), (ColumnKind::Integer, false));
        let weight = schema.column("weight").unwrap();
        assert_eq!((weight.kind, weight.drift), (ColumnKind::Text, true));
    }

    #[test]
    fn test_module_profile_excludes_set_and_adds_code() {
        let records = vec![record(json!({"id": "base1-1", "set": {"id": "base1"}, "hp": 60}))];
        let schema = infer(&records, InferenceConfig::modules()).unwrap();
        assert!(schema.column("set").is_none());
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["id", "hp", "packName", "packSeries", "packCode", "releaseDate", "imageUrl"]
        );
    }

    #[test]
    fn test_missing_id_is_error() {
        let records = vec![record(json!({"name": "Alakazam"}))];
        assert_eq!(
            infer(&records, InferenceConfig::flat()).unwrap_err(),
            SchemaError::MissingId
        );
    }

    #[test]
    fn test_reserved_column_is_error() {
        let records = vec![record(json!({"id": "a", "packName": "Base"}))];
        assert_eq!(
            infer(&records, InferenceConfig::flat()).unwrap_err(),
            SchemaError::ReservedColumn {
                name: "packName".to_string()
            }
        );
    }

    #[test]
    fn test_pack_code_is_free_in_flat_profile() {
        let records = vec![record(json!({"id": "a", "packCode": "BS"}))];
        let schema = infer(&records, InferenceConfig::flat()).unwrap();
        assert_eq!(schema.column("packCode").unwrap().source, ColumnSource::Field);
    }
}
