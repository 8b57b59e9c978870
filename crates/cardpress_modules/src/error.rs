//! Error types for module loading and evaluation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a module into the graph.
///
/// Every variant is fatal for the whole extraction: a broken module means a
/// corrupted source tree, not a skippable record.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Failed to read module {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing export default in {path}")]
    MissingDefaultExport { path: PathBuf },

    #[error("Import cycle detected: {}", display_chain(.chain))]
    ImportCycle { chain: Vec<PathBuf> },

    #[error("Invalid specifier literal '{raw}' in {path}: {reason}")]
    InvalidSpecifier {
        path: PathBuf,
        raw: String,
        reason: String,
    },
}

/// Errors raised by a module runtime while producing values.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Module runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Evaluation handoff failed: {0}")]
    Handoff(#[from] std::io::Error),

    #[error("Evaluation process exited with {status}: {message}")]
    ProcessFailed { status: String, message: String },

    #[error("Malformed evaluation result: {0}")]
    MalformedResult(String),

    #[error("Unsupported syntax in {path} at byte {offset}: {message}")]
    Syntax {
        path: PathBuf,
        offset: usize,
        message: String,
    },

    #[error("Evaluation of {path} failed: {message}")]
    Evaluation { path: PathBuf, message: String },
}

/// Either side of the engine failing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
