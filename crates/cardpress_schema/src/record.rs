//! Card records and the runtime kinds of their values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the primary key field.
pub const ID_FIELD: &str = "id";

/// One card: an ordered mapping of field names to dynamic values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardRecord(Map<String, Value>);

impl CardRecord {
    /// Wrap `value` if it is a mapping.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.0.get(ID_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set `field`, keeping its position if already present.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for CardRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Runtime kind of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    List,
    Mapping,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Integer,
            Value::Number(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Mapping,
        }
    }
}
