//! Flags shared by the binaries.

use std::path::PathBuf;

use anyhow::Context;
use cardpress_logging::{init_logging, LogConfig};
use clap::Args;

use crate::config::CompileConfig;

#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// TOML file overriding the built-in defaults
    #[arg(long, env = "CARDPRESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging for the cardpress crates (RUST_LOG takes precedence)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Also append logs to this file
    #[arg(long, env = "CARDPRESS_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl CommonArgs {
    /// Load the configuration file (or defaults), then install logging.
    pub fn init(&self, app_name: &str) -> anyhow::Result<CompileConfig> {
        let mut config = CompileConfig::load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;
        if self.log_file.is_some() {
            config.log_file = self.log_file.clone();
        }
        init_logging(LogConfig {
            app_name,
            verbose: self.verbose,
            log_file: config.log_file.as_deref(),
        })?;
        Ok(config)
    }
}
