//! Compile configuration.
//!
//! Every setting has a default, so both binaries run with no arguments. A
//! TOML file can override the defaults, and command-line flags (or their
//! `CARDPRESS_*` environment variables) override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileConfig {
    #[serde(default)]
    pub flat: FlatConfig,

    #[serde(default)]
    pub modules: ModulesConfig,

    /// Also append logs to this file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Flat per-set JSON corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatConfig {
    #[serde(default = "default_flat_cards_dir")]
    pub cards_dir: PathBuf,

    #[serde(default = "default_sets_path")]
    pub sets_path: PathBuf,

    #[serde(default = "default_flat_db_path")]
    pub db_path: PathBuf,
}

/// Typed source module tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default = "default_modules_cards_dir")]
    pub cards_dir: PathBuf,

    #[serde(default = "default_modules_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub runtime: RuntimeKind,

    /// Explicit `node` binary; looked up on PATH when unset.
    #[serde(default)]
    pub node_path: Option<PathBuf>,
}

/// How module bodies are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// One `node` child process per compilation.
    #[default]
    Node,
    /// In-process evaluator for declarative module bodies.
    Builtin,
}

fn default_flat_cards_dir() -> PathBuf {
    PathBuf::from("pokemon-tcg-data/cards/en")
}

fn default_sets_path() -> PathBuf {
    PathBuf::from("pokemon-tcg-data/sets/en.json")
}

fn default_flat_db_path() -> PathBuf {
    PathBuf::from("data/cards.sqlite")
}

fn default_modules_cards_dir() -> PathBuf {
    PathBuf::from("cards-database/data")
}

fn default_modules_db_path() -> PathBuf {
    PathBuf::from("data/cards2.sqlite")
}

impl Default for FlatConfig {
    fn default() -> Self {
        Self {
            cards_dir: default_flat_cards_dir(),
            sets_path: default_sets_path(),
            db_path: default_flat_db_path(),
        }
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            cards_dir: default_modules_cards_dir(),
            db_path: default_modules_db_path(),
            runtime: RuntimeKind::default(),
            node_path: None,
        }
    }
}

impl CompileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        toml::from_str(&content).map_err(|e| CompileError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The file at `path` if given, else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompileConfig::default();
        assert_eq!(config.flat.db_path, PathBuf::from("data/cards.sqlite"));
        assert_eq!(config.modules.cards_dir, PathBuf::from("cards-database/data"));
        assert_eq!(config.modules.runtime, RuntimeKind::Node);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CompileConfig = toml::from_str(
            r#"
[modules]
runtime = "builtin"
db_path = "out/modules.sqlite"
"#,
        )
        .unwrap();
        assert_eq!(config.modules.runtime, RuntimeKind::Builtin);
        assert_eq!(config.modules.db_path, PathBuf::from("out/modules.sqlite"));
        assert_eq!(config.modules.cards_dir, PathBuf::from("cards-database/data"));
        assert_eq!(config.flat, FlatConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cardpress.toml");
        std::fs::write(&path, "[modules]\nruntime = \"python\"\n").unwrap();
        assert!(matches!(
            CompileConfig::load(&path).unwrap_err(),
            CompileError::Config { .. }
        ));
    }
}
