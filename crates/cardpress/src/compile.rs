//! Compile pipelines: corpus -> schema -> SQLite artifact.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cardpress_modules::{EngineError, LiteralRuntime, ModuleRuntime, NodeRuntime};
use cardpress_schema::{infer, CardRecord, InferenceConfig, PackFields};
use cardpress_sinks::SqliteMaterializer;
use tracing::info;

use crate::collect::CardCollector;
use crate::config::{FlatConfig, ModulesConfig, RuntimeKind};
use crate::error::{CompileError, Result};
use crate::flat;
use crate::sets::SetCatalog;

/// Outcome of one successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSummary {
    pub cards: u64,
    pub skipped: usize,
    pub path: PathBuf,
}

impl fmt::Display for CompileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Compiled {} cards into {}", self.cards, self.path.display())
    }
}

/// Compile a directory of per-set JSON files.
///
/// Any previous artifact is removed first, so a failed run leaves none.
pub fn compile_flat(config: &FlatConfig) -> Result<CompileSummary> {
    let start = Instant::now();
    SqliteMaterializer::new(&config.db_path).discard()?;
    let catalog = SetCatalog::load(&config.sets_path)?;
    let cards = flat::load_cards(&config.cards_dir, &catalog)?;
    info!(sets = catalog.len(), cards = cards.len(), "loaded flat corpus");

    let written = materialize(&cards, InferenceConfig::flat(), &config.db_path)?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "flat compilation finished");
    Ok(CompileSummary {
        cards: written,
        skipped: 0,
        path: config.db_path.clone(),
    })
}

/// Compile a module tree with an explicit runtime.
pub fn compile_modules_with<R: ModuleRuntime>(
    config: &ModulesConfig,
    runtime: R,
) -> Result<CompileSummary> {
    let start = Instant::now();
    SqliteMaterializer::new(&config.db_path).discard()?;
    let mut collector = CardCollector::new(runtime);
    let collection = collector.collect(&config.cards_dir)?;

    let written = materialize(&collection.cards, InferenceConfig::modules(), &config.db_path)?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "module compilation finished");
    Ok(CompileSummary {
        cards: written,
        skipped: collection.skipped,
        path: config.db_path.clone(),
    })
}

/// Compile a module tree with the runtime named in `config`.
pub fn compile_modules(config: &ModulesConfig) -> Result<CompileSummary> {
    compile_modules_with(config, runtime_for(config)?)
}

/// Build the runtime selected by `config`.
pub fn runtime_for(config: &ModulesConfig) -> Result<Box<dyn ModuleRuntime>> {
    let runtime: Box<dyn ModuleRuntime> = match config.runtime {
        RuntimeKind::Node => match &config.node_path {
            Some(node) => Box::new(NodeRuntime::with_binary(node)),
            None => Box::new(NodeRuntime::locate().map_err(EngineError::from)?),
        },
        RuntimeKind::Builtin => Box::new(LiteralRuntime::new()),
    };
    Ok(runtime)
}

fn materialize(
    cards: &[(CardRecord, PackFields)],
    inference: InferenceConfig,
    db_path: &Path,
) -> Result<u64> {
    if cards.is_empty() {
        return Err(CompileError::configuration("empty corpus: no cards to compile"));
    }
    let schema = infer(cards.iter().map(|(record, _)| record), inference)?;
    info!(columns = schema.len(), "schema inferred");
    let written = SqliteMaterializer::new(db_path)
        .write(&schema, cards.iter().map(|(record, pack)| (record, pack)))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let summary = CompileSummary {
            cards: 102,
            skipped: 0,
            path: PathBuf::from("data/cards.sqlite"),
        };
        assert_eq!(summary.to_string(), "Compiled 102 cards into data/cards.sqlite");
    }

    #[test]
    fn test_builtin_runtime_needs_no_node() {
        let config = ModulesConfig {
            runtime: RuntimeKind::Builtin,
            ..ModulesConfig::default()
        };
        assert!(runtime_for(&config).is_ok());
    }

    #[test]
    fn test_empty_corpus_is_configuration_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db = tmp.path().join("cards.sqlite");
        let err = materialize(&[], InferenceConfig::flat(), &db).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
        assert!(!db.exists());
    }
}
