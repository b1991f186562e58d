//! Single-task mutations.
//!
//! Each command resolves its references against the current expanded
//! listing, then runs exactly one engine operation.

use anyhow::{bail, Result};
use clap::Subcommand;
use log::info;
use nestdo_core::{MoveDirection, TaskId, TaskStatus};
use rusqlite::Connection;

use super::{expanded_rows, open_service, Service};
use crate::resolve::resolve_ref;

#[derive(Subcommand, Debug)]
pub enum EditCommand {
    /// Create a task at the end of its sibling group.
    Add {
        title: String,
        /// Parent task; root level when omitted.
        #[arg(long)]
        parent: Option<String>,
    },
    /// Mark a task done; parents whose children are all done follow.
    Done { reference: String },
    /// Mark a task as not done again.
    Undo { reference: String },
    /// Flip a task between done and not done.
    Toggle { reference: String },
    /// Change a task title.
    Rename { reference: String, title: String },
    /// Delete a task and everything under it.
    Delete { reference: String },
    /// Reparent a task; root level when --parent is omitted.
    Move {
        reference: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Make a task the last child of its previous sibling.
    Indent { reference: String },
    /// Move a task up one level, after its former parent's siblings.
    Outdent { reference: String },
    /// Swap a task with its previous sibling.
    Up { reference: String },
    /// Swap a task with its next sibling.
    Down { reference: String },
    /// Delete every task.
    Clear {
        /// Required confirmation.
        #[arg(long)]
        yes: bool,
    },
}

impl EditCommand {
    pub fn run(self, conn: &Connection) -> Result<()> {
        let service = open_service(conn)?;
        let message = self.execute(&service)?;
        println!("{message}");
        Ok(())
    }

    fn execute(self, service: &Service<'_>) -> Result<String> {
        let kind = self.kind();
        let rows = expanded_rows(service)?;
        let resolve = |reference: &str| resolve_ref(&rows, reference);

        let message = match self {
            Self::Add { title, parent } => {
                let parent_id = parent.as_deref().map(resolve).transpose()?;
                let task = service.create(&title, parent_id)?;
                format!("Added {}", task.id)
            }
            Self::Done { reference } => {
                let id = resolve(&reference)?;
                let propagated = service.complete(id)?;
                completion_message(id, propagated.len())
            }
            Self::Undo { reference } => {
                let id = resolve(&reference)?;
                service.reopen(id)?;
                format!("Reopened {id}")
            }
            Self::Toggle { reference } => {
                let id = resolve(&reference)?;
                match service.toggle(id)? {
                    TaskStatus::Done => format!("Completed {id}"),
                    TaskStatus::Todo => format!("Reopened {id}"),
                }
            }
            Self::Rename { reference, title } => {
                let id = resolve(&reference)?;
                service.rename(id, &title)?;
                format!("Renamed {id}")
            }
            Self::Delete { reference } => {
                let id = resolve(&reference)?;
                let removed = subtree_size(service, id)?;
                service.delete(id)?;
                format!("Deleted {id} ({removed} task(s))")
            }
            Self::Move { reference, parent } => {
                let id = resolve(&reference)?;
                let parent_id = parent.as_deref().map(resolve).transpose()?;
                service.move_task(id, parent_id)?;
                match parent_id {
                    Some(parent_id) => format!("Moved {id} under {parent_id}"),
                    None => format!("Moved {id} to root level"),
                }
            }
            Self::Indent { reference } => {
                let id = resolve(&reference)?;
                let parent_id = service.indent(id)?;
                format!("Moved {id} under {parent_id}")
            }
            Self::Outdent { reference } => {
                let id = resolve(&reference)?;
                match service.outdent(id)? {
                    Some(parent_id) => format!("Moved {id} under {parent_id}"),
                    None => format!("Moved {id} to root level"),
                }
            }
            Self::Up { reference } => {
                let id = resolve(&reference)?;
                service.reorder_sibling(id, MoveDirection::Up)?;
                format!("Moved {id} up")
            }
            Self::Down { reference } => {
                let id = resolve(&reference)?;
                service.reorder_sibling(id, MoveDirection::Down)?;
                format!("Moved {id} down")
            }
            Self::Clear { yes } => {
                if !yes {
                    bail!("refusing to delete every task without --yes");
                }
                let removed = service.clear_all()?;
                format!("Cleared {removed} task(s)")
            }
        };
        info!("event=cli_edit module=cli status=ok command={kind}");
        Ok(message)
    }
}

impl EditCommand {
    fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Done { .. } => "done",
            Self::Undo { .. } => "undo",
            Self::Toggle { .. } => "toggle",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::Move { .. } => "move",
            Self::Indent { .. } => "indent",
            Self::Outdent { .. } => "outdent",
            Self::Up { .. } => "up",
            Self::Down { .. } => "down",
            Self::Clear { .. } => "clear",
        }
    }
}

fn completion_message(id: TaskId, propagated: usize) -> String {
    if propagated == 0 {
        format!("Completed {id}")
    } else {
        format!("Completed {id}; {propagated} parent task(s) completed too")
    }
}

fn subtree_size(service: &Service<'_>, id: TaskId) -> Result<usize> {
    let forest = service.tree()?;
    let mut count = 0;
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        count += 1;
        stack.extend(forest.children(current).map(|node| node.task.id));
    }
    Ok(count)
}
