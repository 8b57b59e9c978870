//! Compile flat per-set JSON files into a SQLite card table.

use std::path::PathBuf;
use std::process::ExitCode;

use cardpress::cli::CommonArgs;
use cardpress::compile_flat;
use clap::Parser;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "cardpress-flat", version, about = "Compile flat per-set card JSON into SQLite")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory of per-set card files (`<setId>.json`)
    #[arg(long, env = "CARDPRESS_FLAT_CARDS_DIR")]
    cards_dir: Option<PathBuf>,

    /// JSON list of set objects
    #[arg(long, env = "CARDPRESS_SETS_PATH")]
    sets_path: Option<PathBuf>,

    /// Output SQLite file (replaced on success)
    #[arg(long, env = "CARDPRESS_FLAT_DB_PATH")]
    db_path: Option<PathBuf>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.common.init("cardpress-flat")?;
    let mut flat = config.flat;
    if let Some(dir) = cli.cards_dir {
        flat.cards_dir = dir;
    }
    if let Some(path) = cli.sets_path {
        flat.sets_path = path;
    }
    if let Some(path) = cli.db_path {
        flat.db_path = path;
    }

    let summary = compile_flat(&flat)?;
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
