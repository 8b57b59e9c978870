//! Card corpus compiler.
//!
//! Two pipelines share one back half: records are collected (from flat
//! per-set JSON files, or by evaluating a tree of source modules), a schema
//! is inferred from the whole corpus, and the rows are materialized into a
//! single `cards` table in a fresh SQLite file.

pub mod cli;
pub mod collect;
pub mod compile;
pub mod config;
pub mod dates;
pub mod error;
pub mod flat;
pub mod sets;

pub use collect::{CardCollector, Collection, RecordOutcome, SkipReason};
pub use compile::{compile_flat, compile_modules, compile_modules_with, CompileSummary};
pub use config::{CompileConfig, FlatConfig, ModulesConfig, RuntimeKind};
pub use error::{CompileError, Result};
