//! Module runtimes: the narrow primitive that turns module bodies into values.
//!
//! A runtime never resolves anything itself. It receives modules in
//! dependency order, and every parameter of a module is bound to the value of
//! the matching dependency, either evaluated earlier in the same call or
//! supplied in `resolved`.

mod lexer;
pub mod literal;
pub mod node;

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ExtractionError;
use crate::graph::{ModuleGraph, ModuleId};

pub use literal::LiteralRuntime;
pub use node::NodeRuntime;

pub trait ModuleRuntime {
    /// Evaluate `pending` (a dependency-ordered slice of graph ids) and
    /// return one value per pending module, in the same order.
    ///
    /// `undefined` results are reported as `Value::Null`.
    fn evaluate(
        &mut self,
        graph: &ModuleGraph,
        pending: &[ModuleId],
        resolved: &HashMap<ModuleId, Value>,
    ) -> Result<Vec<Value>, ExtractionError>;
}

impl<R: ModuleRuntime + ?Sized> ModuleRuntime for Box<R> {
    fn evaluate(
        &mut self,
        graph: &ModuleGraph,
        pending: &[ModuleId],
        resolved: &HashMap<ModuleId, Value>,
    ) -> Result<Vec<Value>, ExtractionError> {
        (**self).evaluate(graph, pending, resolved)
    }
}
