//! Shared logging setup for the cardpress binaries.
//!
//! Logs go to stderr (stdout carries only the completion line), and
//! optionally to a plain append-only file.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "cardpress=info,cardpress_modules=info,cardpress_schema=info,cardpress_sinks=info";
const VERBOSE_LOG_FILTER: &str =
    "cardpress=debug,cardpress_modules=debug,cardpress_schema=debug,cardpress_sinks=debug";

/// Logging configuration shared by the binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug level for the cardpress crates unless `RUST_LOG` says otherwise.
    pub verbose: bool,
    pub log_file: Option<&'a Path>,
}

/// Filter from `RUST_LOG`, falling back to the cardpress defaults.
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let file_layer = match config.log_file {
        Some(path) => {
            let writer = SharedFileWriter::open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter(config.verbose)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter(config.verbose)),
        )
        .try_init()
        .with_context(|| format!("Failed to initialize logging for {}", config.app_name))?;

    tracing::debug!(app = config.app_name, "logging initialized");
    Ok(())
}

/// Append-only log file shared between fmt writers.
#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

struct SharedFileGuard {
    file: Arc<Mutex<File>>,
}

impl Write for SharedFileGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file lock poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file lock poisoned"))?;
        file.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            file: Arc::clone(&self.file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_directives_follow_verbose() {
        assert!(default_directives(false).contains("cardpress=info"));
        assert!(default_directives(true).contains("cardpress_modules=debug"));
    }

    #[test]
    fn test_file_writer_appends() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("logs/cardpress.log");
        let writer = SharedFileWriter::open(&path).unwrap();
        {
            use tracing_subscriber::fmt::MakeWriter;
            let mut guard = writer.make_writer();
            guard.write_all(b"one\n").unwrap();
            let mut guard = writer.make_writer();
            guard.write_all(b"two\n").unwrap();
        }
        drop(writer);
        let writer = SharedFileWriter::open(&path).unwrap();
        {
            use tracing_subscriber::fmt::MakeWriter;
            writer.make_writer().write_all(b"three\n").unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\nthree\n");
    }
}
