//! Schema errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("No record in the corpus has an 'id' field")]
    MissingId,

    #[error("Record field '{name}' collides with a derived column of the same name")]
    ReservedColumn { name: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
