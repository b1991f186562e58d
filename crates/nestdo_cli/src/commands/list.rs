//! `nestdo list` — numbered tree view.

use anyhow::Result;
use clap::Args;
use nestdo_core::FlatRow;
use rusqlite::Connection;
use std::fmt::Write;

use super::{expanded_rows, open_service};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit every task as JSON in listing order.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn run(self, conn: &Connection) -> Result<()> {
        let service = open_service(conn)?;
        let rows = expanded_rows(&service)?;

        if self.json {
            let tasks: Vec<_> = rows.iter().map(|row| &row.task).collect();
            println!("{}", serde_json::to_string_pretty(&tasks)?);
            return Ok(());
        }

        print!("{}", render_rows(&rows));
        Ok(())
    }
}

/// One line per row: number, indentation, checkbox, title, child progress
/// and full id.
pub fn render_rows(rows: &[FlatRow]) -> String {
    if rows.is_empty() {
        return "No tasks.\n".to_string();
    }

    let width = rows.len().to_string().len();
    let mut out = String::new();
    for (index, row) in rows.iter().enumerate() {
        let mark = if row.task.is_done() { 'x' } else { ' ' };
        let _ = write!(
            out,
            "{:>width$}. {}[{mark}] {}",
            index + 1,
            "  ".repeat(row.depth),
            row.task.title
        );
        if row.has_children {
            let _ = write!(out, " ({}/{})", row.done_children, row.total_children);
        }
        let _ = writeln!(out, "  {}", row.task.id);
    }
    out
}
