//! Core task store for nestdo.
//! This crate is the single source of truth for task tree invariants.

pub mod batch;
pub mod db;
pub mod instruction;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod tree;
pub mod undo;

pub use batch::{apply_batch, BatchError, BatchFailure, BatchOperation, BatchOutcome};
pub use instruction::{
    parse_operations, render_prompt, render_tree_listing, InstructionError, InstructionProcessor,
    InstructionRequest, PreviousProposal,
};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::task::{normalize_title, InvalidTitle, Task, TaskId, TaskStatus};
pub use repo::task_repo::{
    ChildStats, SqliteTaskRepository, TaskRepoError, TaskRepoResult, TaskRepository,
};
pub use service::task_service::{
    ErrorCategory, MoveDirection, TaskService, TaskServiceError, TaskServiceResult,
};
pub use session::TaskSession;
pub use tree::{FlatRow, TaskForest, TreeNode};
pub use undo::{UndoStack, DEFAULT_UNDO_DEPTH};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
