//! Out-of-process evaluation through a `node` child process.
//!
//! ## Handoff
//! One process per call. The driver script is embedded in the binary and
//! materialized into a fresh temp directory together with a manifest; the
//! child writes its values to a result file in the same directory. There is
//! no streaming channel: the caller blocks until the child exits.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::ModuleRuntime;
use crate::error::ExtractionError;
use crate::graph::{ModuleGraph, ModuleId};

/// Embedded driver source, materialized per evaluation.
const DRIVER_SOURCE: &str = include_str!("../../shim/evaluate_modules.mjs");

const DRIVER_FILE: &str = "evaluate_modules.mjs";
const MANIFEST_FILE: &str = "manifest.json";
const RESULT_FILE: &str = "result.json";

#[derive(Debug, Clone)]
pub struct NodeRuntime {
    node: PathBuf,
}

#[derive(Serialize)]
struct Manifest<'a> {
    preset: Vec<PresetValue<'a>>,
    modules: Vec<ManifestModule<'a>>,
}

#[derive(Serialize)]
struct PresetValue<'a> {
    id: usize,
    value: &'a Value,
}

#[derive(Serialize)]
struct ManifestModule<'a> {
    id: usize,
    path: String,
    params: &'a [String],
    deps: Vec<usize>,
    body: &'a str,
}

impl NodeRuntime {
    /// Find `node` on PATH.
    pub fn locate() -> Result<Self, ExtractionError> {
        which::which("node")
            .map(Self::with_binary)
            .map_err(|e| ExtractionError::RuntimeUnavailable(format!("node not found on PATH: {e}")))
    }

    pub fn with_binary(node: impl Into<PathBuf>) -> Self {
        Self { node: node.into() }
    }
}

impl ModuleRuntime for NodeRuntime {
    fn evaluate(
        &mut self,
        graph: &ModuleGraph,
        pending: &[ModuleId],
        resolved: &HashMap<ModuleId, Value>,
    ) -> Result<Vec<Value>, ExtractionError> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let handoff = tempfile::Builder::new()
            .prefix("cardpress-eval-")
            .tempdir()?;
        let driver_path = handoff.path().join(DRIVER_FILE);
        let manifest_path = handoff.path().join(MANIFEST_FILE);
        let result_path = handoff.path().join(RESULT_FILE);

        std::fs::write(&driver_path, DRIVER_SOURCE)?;
        write_manifest(&manifest_path, &build_manifest(graph, pending, resolved))?;

        let start = Instant::now();
        info!(
            node = %self.node.display(),
            modules = pending.len(),
            "spawning module evaluation process"
        );
        let output = Command::new(&self.node)
            .arg(&driver_path)
            .arg(&manifest_path)
            .arg(&result_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ExtractionError::RuntimeUnavailable(format!(
                    "failed to spawn {}: {e}",
                    self.node.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(ExtractionError::ProcessFailed {
                status: output.status.to_string(),
                message: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "evaluation process exited");

        let text = std::fs::read_to_string(&result_path)
            .map_err(|e| ExtractionError::MalformedResult(format!("result file unreadable: {e}")))?;
        parse_result(&text, pending.len())
    }
}

fn build_manifest<'a>(
    graph: &'a ModuleGraph,
    pending: &[ModuleId],
    resolved: &'a HashMap<ModuleId, Value>,
) -> Manifest<'a> {
    let mut preset: Vec<PresetValue<'a>> = Vec::new();
    let mut modules = Vec::with_capacity(pending.len());
    for &id in pending {
        let module = graph.get(id);
        for dep in &module.deps {
            if let Some(value) = resolved.get(dep) {
                if !preset.iter().any(|p| p.id == dep.index()) {
                    preset.push(PresetValue {
                        id: dep.index(),
                        value,
                    });
                }
            }
        }
        modules.push(ManifestModule {
            id: id.index(),
            path: module.path.display().to_string(),
            params: &module.params,
            deps: module.deps.iter().map(|d| d.index()).collect(),
            body: &module.body,
        });
    }
    Manifest { preset, modules }
}

fn write_manifest(path: &Path, manifest: &Manifest<'_>) -> Result<(), ExtractionError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, manifest).map_err(std::io::Error::other)?;
    writer.flush()?;
    Ok(())
}

fn parse_result(text: &str, expected: usize) -> Result<Vec<Value>, ExtractionError> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| ExtractionError::MalformedResult(format!("invalid JSON: {e}")))?;
    let Value::Array(values) = payload else {
        return Err(ExtractionError::MalformedResult(
            "evaluation output is not a list".to_string(),
        ));
    };
    if values.len() != expected {
        return Err(ExtractionError::MalformedResult(format!(
            "expected {expected} values, got {}",
            values.len()
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_result_accepts_matching_list() {
        let values = parse_result(r#"[{"id":"a"},null]"#, 2).unwrap();
        assert_eq!(values, vec![json!({"id": "a"}), Value::Null]);
    }

    #[test]
    fn test_parse_result_rejects_non_list() {
        let err = parse_result(r#"{"id":"a"}"#, 1).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResult(_)));
    }

    #[test]
    fn test_parse_result_rejects_length_mismatch() {
        let err = parse_result("[1]", 2).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResult(_)));
    }

    #[test]
    fn test_missing_binary_is_runtime_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let module = tmp.path().join("a.ts");
        std::fs::write(&module, "export default 1\n").unwrap();

        let mut graph = ModuleGraph::new();
        let id = graph.load(&module).unwrap();
        let mut runtime = NodeRuntime::with_binary(tmp.path().join("no-such-node"));
        let err = runtime.evaluate(&graph, &[id], &HashMap::new()).unwrap_err();
        assert!(matches!(err, ExtractionError::RuntimeUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_process_failed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let module = tmp.path().join("a.ts");
        std::fs::write(&module, "export default 1\n").unwrap();

        let mut graph = ModuleGraph::new();
        let id = graph.load(&module).unwrap();
        let mut runtime = NodeRuntime::with_binary("/bin/false");
        let err = runtime.evaluate(&graph, &[id], &HashMap::new()).unwrap_err();
        assert!(matches!(err, ExtractionError::ProcessFailed { .. }));
    }
}
