//! Compile a tree of typed card source modules into a SQLite card table.

use std::path::PathBuf;
use std::process::ExitCode;

use cardpress::cli::CommonArgs;
use cardpress::{compile_modules, RuntimeKind};
use clap::Parser;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "cardpress-modules", version, about = "Compile card source modules into SQLite")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Root of the module tree (`<serie>/<set>/<localId>.ts`)
    #[arg(long, env = "CARDPRESS_MODULES_CARDS_DIR")]
    cards_dir: Option<PathBuf>,

    /// Output SQLite file (replaced on success)
    #[arg(long, env = "CARDPRESS_MODULES_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Module evaluator
    #[arg(long, value_enum, env = "CARDPRESS_RUNTIME")]
    runtime: Option<RuntimeKind>,

    /// `node` binary (default: looked up on PATH)
    #[arg(long, env = "CARDPRESS_NODE")]
    node: Option<PathBuf>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.common.init("cardpress-modules")?;
    let mut modules = config.modules;
    if let Some(dir) = cli.cards_dir {
        modules.cards_dir = dir;
    }
    if let Some(path) = cli.db_path {
        modules.db_path = path;
    }
    if let Some(runtime) = cli.runtime {
        modules.runtime = runtime;
    }
    if cli.node.is_some() {
        modules.node_path = cli.node;
    }

    let summary = compile_modules(&modules)?;
    println!("{summary}");
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
