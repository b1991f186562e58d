//! `nestdo apply` — run an operation list produced by an instruction
//! processor.
//!
//! Input may be bare JSON or free-form model output with a fenced block.
//! The batch is all-or-nothing.

use anyhow::{Context, Result};
use clap::Args;
use log::info;
use nestdo_core::{apply_batch, parse_operations};
use rusqlite::Connection;
use std::io::Read;
use std::path::PathBuf;

use super::open_service;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// File with the operations; stdin when omitted or `-`.
    pub file: Option<PathBuf>,
}

impl ApplyArgs {
    pub fn run(self, conn: &Connection) -> Result<()> {
        let raw = self.read_input()?;
        let operations = parse_operations(&raw).context("could not read operations")?;
        if operations.is_empty() {
            println!("No operations to apply.");
            return Ok(());
        }

        let service = open_service(conn)?;
        let outcome = apply_batch(&service, &operations).context("batch rejected; nothing was changed")?;
        info!(
            "event=cli_apply module=cli status=ok applied={} created={}",
            outcome.applied,
            outcome.created.len()
        );
        println!(
            "Applied {} operation(s), created {} task(s).",
            outcome.applied,
            outcome.created.len()
        );
        Ok(())
    }

    fn read_input(&self) -> Result<String> {
        match &self.file {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read `{}`", path.display())),
            _ => {
                let mut raw = String::new();
                std::io::stdin()
                    .read_to_string(&mut raw)
                    .context("failed to read stdin")?;
                Ok(raw)
            }
        }
    }
}
