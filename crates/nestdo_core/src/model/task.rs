//! Task record.
//!
//! # Responsibility
//! - Define the flat task record persisted by the store.
//! - Own title normalization used by create/rename surfaces.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reused.
//! - `parent_id = None` means the task lives in the root sibling group.
//! - Titles reaching the store are trimmed and non-empty.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier.
///
/// UUID v7: random enough to be unguessable, and its hyphenated string form
/// sorts in creation order.
pub type TaskId = Uuid;

/// Generates a fresh task id.
pub fn new_task_id() -> TaskId {
    Uuid::now_v7()
}

/// Completion state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Done,
}

impl TaskStatus {
    /// Storage/wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Done => "done",
        }
    }

    /// Parses the storage string; `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "todo" => Some(Self::Todo),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Todo => Self::Done,
            Self::Done => Self::Todo,
        }
    }

    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the task tree, stored flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    /// Parent task id. `None` means root-level task.
    pub parent_id: Option<TaskId>,
    /// Order key within the sibling group. Ties fall back to `id` order.
    pub position: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms timestamp of the last field mutation.
    pub updated_at: i64,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Title rejected before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTitle;

impl Display for InvalidTitle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "task title must not be blank")
    }
}

impl Error for InvalidTitle {}

/// Trims a user-supplied title.
///
/// # Errors
/// - `InvalidTitle` when nothing but whitespace remains.
pub fn normalize_title(value: &str) -> Result<String, InvalidTitle> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InvalidTitle);
    }
    Ok(trimmed.to_string())
}
