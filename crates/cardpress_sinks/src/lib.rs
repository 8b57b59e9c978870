//! Relational sinks for compiled card tables.

pub mod error;
pub mod sqlite;

pub use error::{Result, SinkError};
pub use sqlite::{SqliteMaterializer, TABLE_NAME};
