//! Subcommand implementations.

pub mod apply;
pub mod edit;
pub mod list;

use anyhow::Result;
use nestdo_core::{FlatRow, SqliteTaskRepository, TaskService};
use rusqlite::Connection;
use std::collections::HashSet;

pub type Service<'conn> = TaskService<SqliteTaskRepository<'conn>>;

pub fn open_service(conn: &Connection) -> Result<Service<'_>> {
    Ok(TaskService::new(SqliteTaskRepository::try_new(conn)?))
}

/// Rows of the fully expanded listing, the numbering `REF` refers to.
pub fn expanded_rows(service: &Service<'_>) -> Result<Vec<FlatRow>> {
    Ok(service.tree()?.flatten(&HashSet::new()))
}
