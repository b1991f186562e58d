//! Application context tying the engine to its undo history.
//!
//! # Responsibility
//! - Own the `TaskService` and the process-local `UndoStack`.
//! - Snapshot before every undoable action so frontends cannot forget to.
//!
//! # Invariants
//! - A snapshot taken for an action that fails is discarded again, and any
//!   snapshot it evicted is put back.
//! - Read-only calls never touch the undo history.

use crate::batch::{apply_batch, BatchError, BatchOperation, BatchOutcome};
use crate::model::task::TaskId;
use crate::repo::task_repo::{TaskRepoError, TaskRepoResult, TaskRepository};
use crate::service::task_service::{TaskService, TaskServiceResult};
use crate::tree::FlatRow;
use crate::undo::UndoStack;
use std::collections::HashSet;

/// Single-actor task session.
pub struct TaskSession<R: TaskRepository> {
    service: TaskService<R>,
    undo: UndoStack,
}

impl<R: TaskRepository> TaskSession<R> {
    /// Creates a session with the default undo depth.
    pub fn new(repo: R) -> Self {
        Self::with_undo(repo, UndoStack::default())
    }

    pub fn with_undo(repo: R, undo: UndoStack) -> Self {
        Self {
            service: TaskService::new(repo),
            undo,
        }
    }

    /// Engine access for reads and non-undoable calls.
    pub fn service(&self) -> &TaskService<R> {
        &self.service
    }

    /// Runs `action` as one undoable step.
    ///
    /// # Errors
    /// - Snapshot failures abort before `action` runs.
    /// - Errors from `action` are returned after dropping the snapshot.
    pub fn perform<T, E, F>(&mut self, action: F) -> Result<T, E>
    where
        F: FnOnce(&TaskService<R>) -> Result<T, E>,
        E: From<TaskRepoError>,
    {
        let evicted = self.undo.snapshot(self.service.repo())?;
        match action(&self.service) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.undo.cancel_snapshot(evicted);
                Err(err)
            }
        }
    }

    /// Applies a batch from the instruction processor as one undoable step.
    pub fn apply_operations(
        &mut self,
        operations: &[BatchOperation],
    ) -> Result<BatchOutcome, BatchError> {
        self.perform(|service| apply_batch(service, operations))
    }

    /// Restores the state before the latest undoable step.
    ///
    /// Returns `false` when the history is empty.
    pub fn undo(&mut self) -> TaskRepoResult<bool> {
        self.undo.undo(self.service.repo())
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.depth()
    }

    /// Flattened rows for display with `collapsed` subtrees hidden.
    pub fn view(&self, collapsed: &HashSet<TaskId>) -> TaskServiceResult<Vec<FlatRow>> {
        Ok(self.service.tree()?.flatten(collapsed))
    }
}
