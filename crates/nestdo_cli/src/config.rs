//! Resolution of storage and logging locations.
//!
//! Flags win over environment variables (clap `env`), which win over the
//! platform data directory.

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::GlobalArgs;

const APP_DIR: &str = "nestdo";
const DB_FILE: &str = "tasks.sqlite3";
const LOG_SUBDIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let data_dir = || -> Result<PathBuf> {
            dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| anyhow!("could not determine data directory; pass --db and --log-dir"))
        };

        let db_path = match &args.db {
            Some(path) => absolutize(path)?,
            None => data_dir()?.join(DB_FILE),
        };
        let log_dir = match &args.log_dir {
            Some(path) => absolutize(path)?,
            None => data_dir()?.join(LOG_SUBDIR),
        };
        let log_level = args
            .log_level
            .clone()
            .unwrap_or_else(|| nestdo_core::default_log_level().to_string());

        Ok(Self {
            db_path,
            log_level,
            log_dir,
        })
    }

    pub fn init_logging(&self) -> Result<()> {
        nestdo_core::init_logging(&self.log_level, &self.log_dir).map_err(|err| anyhow!("{err}"))
    }

    /// Opens the migrated task database, creating its directory if needed.
    pub fn open_store(&self) -> Result<Connection> {
        nestdo_core::db::open_db(&self.db_path)
            .with_context(|| format!("failed to open `{}`", self.db_path.display()))
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Ok(cwd.join(path))
}
