//! Relational schema of the `cards` table.

use serde::{Deserialize, Serialize};

use crate::record::{ValueKind, ID_FIELD};

/// Storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Date,
}

impl ColumnKind {
    /// Declared SQL type.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Text => "TEXT",
            ColumnKind::Date => "DATE",
        }
    }

    /// Storage kind for a field that only ever held values of `kind`.
    pub fn for_value_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Integer | ValueKind::Boolean => ColumnKind::Integer,
            ValueKind::Float => ColumnKind::Real,
            ValueKind::String | ValueKind::List | ValueKind::Mapping | ValueKind::Null => {
                ColumnKind::Text
            }
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// A column computed per record from pack metadata rather than read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivedField {
    PackName,
    PackSeries,
    PackCode,
    ReleaseDate,
    ImageUrl,
}

impl DerivedField {
    pub fn column_name(self) -> &'static str {
        match self {
            DerivedField::PackName => "packName",
            DerivedField::PackSeries => "packSeries",
            DerivedField::PackCode => "packCode",
            DerivedField::ReleaseDate => "releaseDate",
            DerivedField::ImageUrl => "imageUrl",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            DerivedField::ReleaseDate => ColumnKind::Date,
            _ => ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSource {
    /// Read from the record field of the same name.
    Field,
    Derived(DerivedField),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub ordinal: usize,
    pub source: ColumnSource,
    /// The field held more than one kind of value and was degraded to text.
    pub drift: bool,
}

impl Column {
    pub fn is_primary_key(&self) -> bool {
        self.source == ColumnSource::Field && self.name == ID_FIELD
    }
}

/// Per-record values of the derived columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackFields {
    pub name: Option<String>,
    pub series: Option<String>,
    pub code: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub release_date: Option<String>,
    pub image_url: Option<String>,
}

impl PackFields {
    pub fn get(&self, field: DerivedField) -> Option<&str> {
        match field {
            DerivedField::PackName => self.name.as_deref(),
            DerivedField::PackSeries => self.series.as_deref(),
            DerivedField::PackCode => self.code.as_deref(),
            DerivedField::ReleaseDate => self.release_date.as_deref(),
            DerivedField::ImageUrl => self.image_url.as_deref(),
        }
    }
}

/// Ordered columns of the `cards` table. The `id` column is always first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub(crate) fn new(columns: Vec<Column>) -> Self {
        debug_assert!(columns.first().is_some_and(Column::is_primary_key));
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns degraded to text by schema drift.
    pub fn drifted(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.drift)
    }
}
