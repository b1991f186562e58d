//! nestdo — hierarchical to-do list on the command line.
//!
//! # Usage
//!
//! ```text
//! nestdo list [--json]
//! nestdo add <title> [--parent REF]
//! nestdo done|undo|delete|indent|outdent|up|down REF
//! nestdo rename REF <title>
//! nestdo move REF [--parent REF]
//! nestdo clear --yes
//! nestdo apply [FILE]
//! ```
//!
//! `REF` is a row number from `nestdo list` or a unique id prefix.

mod commands;
mod config;
mod resolve;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use commands::{apply::ApplyArgs, edit::EditCommand, list::ListArgs};

#[derive(Parser, Debug)]
#[command(
    name = "nestdo",
    version,
    about = "Hierarchical to-do list with parent auto-completion",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Storage and logging locations shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// SQLite database file.
    #[arg(long, global = true, env = "NESTDO_DB")]
    pub db: Option<PathBuf>,

    /// trace, debug, info, warn or error.
    #[arg(long, global = true, env = "NESTDO_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rotated log files.
    #[arg(long, global = true, env = "NESTDO_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the task tree with numbered rows.
    List(ListArgs),

    /// Apply an operation list (raw JSON or model output) from FILE or stdin.
    Apply(ApplyArgs),

    #[command(flatten)]
    Edit(EditCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::resolve(&cli.global)?;
    config.init_logging()?;
    let conn = config.open_store()?;

    match cli.command {
        Commands::List(args) => args.run(&conn),
        Commands::Apply(args) => args.run(&conn),
        Commands::Edit(command) => command.run(&conn),
    }
}
