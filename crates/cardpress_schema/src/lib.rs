//! Schema inference and value encoding for card corpora.
//!
//! Records are loosely typed: the same field may hold an integer in one
//! card and a string in another. [`infer`] unifies a whole corpus into one
//! deterministic [`Schema`], and [`encode_row`] turns each record into a row
//! of [`SqlScalar`]s in column order.

pub mod encode;
pub mod error;
pub mod infer;
pub mod record;
pub mod schema;

pub use encode::{encode, encode_row, SqlScalar};
pub use error::{Result, SchemaError};
pub use infer::{infer, InferenceConfig, SchemaInferencer, EXCLUDED_FIELDS, SET_FIELD};
pub use record::{CardRecord, ValueKind, ID_FIELD};
pub use schema::{Column, ColumnKind, ColumnSource, DerivedField, PackFields, Schema};
