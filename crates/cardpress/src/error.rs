//! Compile pipeline errors.

use std::path::{Path, PathBuf};

use cardpress_modules::EngineError;
use cardpress_schema::SchemaError;
use cardpress_sinks::SinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Missing or empty inputs; nothing was written.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input in {path}: {message}")]
    InvalidInput { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl CompileError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CompileError::Configuration(message.into())
    }

    pub fn invalid_input(path: &Path, message: impl Into<String>) -> Self {
        CompileError::InvalidInput {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        CompileError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
