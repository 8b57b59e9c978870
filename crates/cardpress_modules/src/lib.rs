//! Module engine for typed card source trees.
//!
//! Turns a tree of small source modules (one card per file, importing its
//! set definition) into plain JSON values: specifiers are resolved against
//! the filesystem, each module is transformed into a function body, the
//! import graph is loaded into an arena, and a [`ModuleRuntime`] evaluates
//! bodies in dependency order.

pub mod error;
mod escape;
pub mod evaluator;
pub mod graph;
pub mod runtime;
pub mod specifier;
pub mod transform;

pub use error::{EngineError, ExtractionError, ModuleError, Result};
pub use evaluator::ModuleEvaluator;
pub use graph::{ModuleGraph, ModuleId, SourceModule};
pub use runtime::{LiteralRuntime, ModuleRuntime, NodeRuntime};
pub use specifier::{resolve, Resolution};
pub use transform::{AnnotationStripper, ImportStatement, RegexAnnotationStripper, SourceTransformer};
