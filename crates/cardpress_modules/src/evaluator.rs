//! Path-to-value evaluation with per-run memoization.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::graph::{ModuleGraph, ModuleId};
use crate::runtime::ModuleRuntime;

/// Loads modules into a graph and evaluates them through a runtime.
///
/// Values are memoized per module id for the lifetime of the evaluator, so
/// a module shared by many entry points (a set definition imported by every
/// card of the set) is evaluated once.
pub struct ModuleEvaluator<R: ModuleRuntime> {
    graph: ModuleGraph,
    runtime: R,
    values: HashMap<ModuleId, Value>,
}

impl<R: ModuleRuntime> ModuleEvaluator<R> {
    pub fn new(runtime: R) -> Self {
        Self::with_graph(ModuleGraph::new(), runtime)
    }

    pub fn with_graph(graph: ModuleGraph, runtime: R) -> Self {
        Self {
            graph,
            runtime,
            values: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Default export of the module at `path`.
    pub fn evaluate(&mut self, path: &Path) -> Result<Value> {
        let mut values = self.evaluate_all(std::slice::from_ref(&path))?;
        Ok(values.pop().unwrap_or(Value::Null))
    }

    /// Default exports of several entry modules, evaluated in one runtime
    /// call. Results follow the order of `paths`.
    pub fn evaluate_all<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<Vec<Value>> {
        let start = Instant::now();
        let mut roots = Vec::with_capacity(paths.len());
        for path in paths {
            roots.push(self.graph.load(path.as_ref())?);
        }

        let pending: Vec<ModuleId> = self
            .graph
            .ids()
            .filter(|id| !self.values.contains_key(id))
            .collect();

        if !pending.is_empty() {
            debug!(
                pending = pending.len(),
                memoized = self.values.len(),
                "evaluating modules"
            );
            let results = self.runtime.evaluate(&self.graph, &pending, &self.values)?;
            self.values.extend(pending.iter().copied().zip(results));
        }

        let out = roots
            .iter()
            .map(|id| self.values.get(id).cloned().unwrap_or(Value::Null))
            .collect();
        info!(
            entries = roots.len(),
            evaluated = pending.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "module evaluation complete"
        );
        Ok(out)
    }
}
