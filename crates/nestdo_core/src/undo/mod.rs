//! Bounded undo history of full-store snapshots.
//!
//! # Responsibility
//! - Capture the whole task set before an undoable action.
//! - Restore the most recent capture atomically.
//!
//! # Invariants
//! - At most `capacity` snapshots are held; the oldest is evicted first.
//! - Undo is one-directional: a restored snapshot is gone (no redo).
//! - History lives in memory only and starts empty in every process.

use crate::model::task::Task;
use crate::repo::task_repo::{TaskRepoResult, TaskRepository};
use crate::tree::TaskForest;
use log::{debug, error, info};
use std::collections::VecDeque;

/// Default number of undo steps kept.
pub const DEFAULT_UNDO_DEPTH: usize = 50;

/// Stack of task-set snapshots, newest at the back.
#[derive(Debug, Clone)]
pub struct UndoStack {
    snapshots: VecDeque<Vec<Task>>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoStack {
    /// Creates an empty stack. A zero capacity is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Captures the current task set and pushes it.
    ///
    /// Returns the oldest snapshot if it had to be evicted to stay within
    /// capacity. Hand it to `cancel_snapshot` if the action fails.
    pub fn snapshot<R: TaskRepository>(
        &mut self,
        repo: &R,
    ) -> TaskRepoResult<Option<Vec<Task>>> {
        let tasks = repo.list_all()?;
        let size = tasks.len();
        let evicted = self.push(tasks);
        debug!(
            "event=undo_snapshot module=undo status=ok tasks={size} depth={} evicted={}",
            self.snapshots.len(),
            evicted.is_some()
        );
        Ok(evicted)
    }

    /// Replaces the store contents with the newest snapshot.
    ///
    /// Returns `false` when there is nothing to undo. If the restore fails
    /// the snapshot stays on the stack.
    pub fn undo<R: TaskRepository>(&mut self, repo: &R) -> TaskRepoResult<bool> {
        let Some(tasks) = self.snapshots.pop_back() else {
            return Ok(false);
        };

        if let Err(err) = restore(repo, &tasks) {
            error!("event=undo_restore module=undo status=error error={err}");
            self.snapshots.push_back(tasks);
            return Err(err);
        }

        info!(
            "event=undo_restore module=undo status=ok tasks={} depth={}",
            tasks.len(),
            self.snapshots.len()
        );
        Ok(true)
    }

    /// Reverts the latest `snapshot` call: drops the newest snapshot without
    /// restoring it and puts `evicted` back as the oldest entry.
    ///
    /// Returns `false` when the stack was empty.
    pub fn cancel_snapshot(&mut self, evicted: Option<Vec<Task>>) -> bool {
        let dropped = self.snapshots.pop_back().is_some();
        if let Some(tasks) = evicted {
            self.snapshots.push_front(tasks);
        }
        dropped
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(&mut self, tasks: Vec<Task>) -> Option<Vec<Task>> {
        let evicted = if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front()
        } else {
            None
        };
        self.snapshots.push_back(tasks);
        evicted
    }
}

fn restore<R: TaskRepository>(repo: &R, tasks: &[Task]) -> TaskRepoResult<()> {
    // Parents must exist before children for the foreign key to accept them.
    let forest = TaskForest::build(tasks.to_vec());
    repo.run_atomic(|| {
        repo.delete_all()?;
        for task in forest.preorder() {
            repo.insert_task(task)?;
        }
        Ok(())
    })
}
