//! Task mutation engine.
//!
//! # Responsibility
//! - Validate titles and tree structure above the repository layer.
//! - Provide create, rename, status, complete, delete, move, reorder,
//!   indent/outdent and clear operations.
//!
//! # Invariants
//! - Multi-row mutations run inside one `run_atomic` scope.
//! - Moves never make a task its own ancestor.
//! - Only `complete` propagates status upward; delete never does.
//! - The engine knows nothing about undo; callers snapshot first.

use crate::model::task::{normalize_title, InvalidTitle, Task, TaskId, TaskStatus};
use crate::repo::task_repo::{ChildStats, TaskRepoError, TaskRepository};
use crate::tree::TaskForest;
use log::{debug, info};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Direction for sibling reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Toward the start of the sibling group.
    Up,
    /// Toward the end of the sibling group.
    Down,
}

impl Display for MoveDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// Coarse error taxonomy callers use to pick feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Referenced task is missing; nothing happened.
    NotFound,
    /// Structural precondition failed; nothing happened.
    InvalidStructure,
    /// Input rejected before reaching the store.
    Validation,
    /// Persistent store failed; the attempted operation did not apply.
    Storage,
}

/// Errors from task engine operations.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Target task does not exist.
    TaskNotFound(TaskId),
    /// Requested parent does not exist.
    ParentNotFound(TaskId),
    /// Move would place a task under itself or one of its descendants.
    CycleDetected { task_id: TaskId, parent_id: TaskId },
    /// Reorder target is already first/last in its group.
    AtBoundary {
        task_id: TaskId,
        direction: MoveDirection,
    },
    /// Indent target is the first sibling; nothing can adopt it.
    NoPrecedingSibling(TaskId),
    /// Outdent target is already root-level.
    AlreadyRoot(TaskId),
    /// Repository-level failure.
    Repo(TaskRepoError),
}

impl TaskServiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTitle => ErrorCategory::Validation,
            Self::TaskNotFound(_) | Self::ParentNotFound(_) => ErrorCategory::NotFound,
            Self::CycleDetected { .. }
            | Self::AtBoundary { .. }
            | Self::NoPrecedingSibling(_)
            | Self::AlreadyRoot(_) => ErrorCategory::InvalidStructure,
            Self::Repo(_) => ErrorCategory::Storage,
        }
    }
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "task title must not be blank"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent task not found: {id}"),
            Self::CycleDetected { task_id, parent_id } => write!(
                f,
                "move would create cycle: task {task_id} under parent {parent_id}"
            ),
            Self::AtBoundary { task_id, direction } => {
                write!(f, "task {task_id} cannot move {direction} any further")
            }
            Self::NoPrecedingSibling(id) => {
                write!(f, "task {id} has no preceding sibling to indent under")
            }
            Self::AlreadyRoot(id) => write!(f, "task {id} is already at root level"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskRepoError> for TaskServiceError {
    fn from(value: TaskRepoError) -> Self {
        match value {
            TaskRepoError::TaskNotFound(id) => Self::TaskNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<InvalidTitle> for TaskServiceError {
    fn from(_: InvalidTitle) -> Self {
        Self::InvalidTitle
    }
}

pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Task mutation engine facade.
pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Underlying store, for snapshotting and atomic scopes spanning calls.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// All tasks in store scan order.
    pub fn list_tasks(&self) -> TaskServiceResult<Vec<Task>> {
        Ok(self.repo.list_all()?)
    }

    pub fn get_task(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.require_task(id)
    }

    /// Rebuilds the task forest from one full scan.
    pub fn tree(&self) -> TaskServiceResult<TaskForest> {
        Ok(TaskForest::build(self.repo.list_all()?))
    }

    pub fn child_stats(&self, parent_id: Option<TaskId>) -> TaskServiceResult<ChildStats> {
        Ok(self.repo.child_stats(parent_id)?)
    }

    /// Appends a new task to the end of its sibling group.
    pub fn create(&self, title: &str, parent_id: Option<TaskId>) -> TaskServiceResult<Task> {
        let title = normalize_title(title)?;
        let task = self.repo.run_atomic(|| {
            if let Some(parent_id) = parent_id {
                self.ensure_parent_exists(parent_id)?;
            }
            Ok::<_, TaskServiceError>(self.repo.create_task(parent_id, &title)?)
        })?;
        info!(
            "event=task_create module=service status=ok task_id={} parent_id={} position={}",
            task.id,
            format_parent(task.parent_id),
            task.position
        );
        Ok(task)
    }

    pub fn rename(&self, id: TaskId, title: &str) -> TaskServiceResult<()> {
        let title = normalize_title(title)?;
        self.repo.rename_task(id, &title)?;
        info!("event=task_rename module=service status=ok task_id={id}");
        Ok(())
    }

    /// Sets status directly, without propagation.
    pub fn set_status(&self, id: TaskId, status: TaskStatus) -> TaskServiceResult<()> {
        self.repo.set_status(id, status)?;
        info!("event=task_set_status module=service status=ok task_id={id} task_status={status}");
        Ok(())
    }

    /// Marks a task done, then auto-completes ancestors whose direct children
    /// are now all done.
    ///
    /// Returns the ids of auto-completed ancestors, nearest first. The walk
    /// only visits ancestors and stops at the first one with unfinished
    /// children.
    pub fn complete(&self, id: TaskId) -> TaskServiceResult<Vec<TaskId>> {
        let propagated = self.repo.run_atomic(|| {
            let task = self.require_task(id)?;
            self.repo.set_status(id, TaskStatus::Done)?;

            let mut propagated = Vec::new();
            let mut visited = HashSet::from([id]);
            let mut cursor = task.parent_id;
            while let Some(ancestor_id) = cursor {
                if !visited.insert(ancestor_id) {
                    break;
                }
                if !self.repo.child_stats(Some(ancestor_id))?.all_done() {
                    break;
                }
                let Some(ancestor) = self.repo.get_task(ancestor_id)? else {
                    break;
                };
                if !ancestor.is_done() {
                    self.repo.set_status(ancestor_id, TaskStatus::Done)?;
                    propagated.push(ancestor_id);
                }
                cursor = ancestor.parent_id;
            }
            Ok::<_, TaskServiceError>(propagated)
        })?;
        info!(
            "event=task_complete module=service status=ok task_id={id} propagated={}",
            propagated.len()
        );
        Ok(propagated)
    }

    /// Sets a task back to todo. Ancestors are left as they are.
    pub fn reopen(&self, id: TaskId) -> TaskServiceResult<()> {
        self.set_status(id, TaskStatus::Todo)
    }

    /// Flips status: todo goes through `complete`, done goes back to todo.
    ///
    /// Returns the resulting status of `id`.
    pub fn toggle(&self, id: TaskId) -> TaskServiceResult<TaskStatus> {
        let task = self.require_task(id)?;
        match task.status {
            TaskStatus::Todo => {
                self.complete(id)?;
                Ok(TaskStatus::Done)
            }
            TaskStatus::Done => {
                self.reopen(id)?;
                Ok(TaskStatus::Todo)
            }
        }
    }

    /// Deletes a task and its whole subtree. The former parent is not
    /// re-evaluated for completion.
    pub fn delete(&self, id: TaskId) -> TaskServiceResult<()> {
        self.repo.delete_task(id)?;
        info!("event=task_delete module=service status=ok task_id={id}");
        Ok(())
    }

    /// Reparents a task, appending it to the end of the new sibling group.
    pub fn move_task(&self, id: TaskId, new_parent_id: Option<TaskId>) -> TaskServiceResult<()> {
        self.repo.run_atomic(|| {
            self.require_task(id)?;
            if let Some(parent_id) = new_parent_id {
                if parent_id == id {
                    return Err(TaskServiceError::CycleDetected {
                        task_id: id,
                        parent_id,
                    });
                }
                self.ensure_parent_exists(parent_id)?;
                if self.would_create_cycle(id, parent_id)? {
                    return Err(TaskServiceError::CycleDetected {
                        task_id: id,
                        parent_id,
                    });
                }
            }
            self.append_to_group(id, new_parent_id)
        })?;
        info!(
            "event=task_move module=service status=ok task_id={id} parent_id={}",
            format_parent(new_parent_id)
        );
        Ok(())
    }

    /// Swaps position with the adjacent sibling in `direction`.
    pub fn reorder_sibling(&self, id: TaskId, direction: MoveDirection) -> TaskServiceResult<()> {
        self.repo.run_atomic(|| {
            let task = self.require_task(id)?;
            let mut siblings = self.repo.list_children(task.parent_id)?;
            let index = sibling_index(&siblings, id)?;
            let neighbor = match direction {
                MoveDirection::Up => index.checked_sub(1),
                MoveDirection::Down => Some(index + 1).filter(|next| *next < siblings.len()),
            }
            .ok_or(TaskServiceError::AtBoundary {
                task_id: id,
                direction,
            })?;

            if siblings[index].position == siblings[neighbor].position {
                // Tied positions cannot be swapped; spread the group first.
                debug!(
                    "event=task_reorder module=service status=renumber parent_id={}",
                    format_parent(task.parent_id)
                );
                for (offset, sibling) in siblings.iter_mut().enumerate() {
                    sibling.position = offset as i64;
                    self.repo.set_position(sibling.id, sibling.position)?;
                }
            }

            self.repo
                .set_position(siblings[index].id, siblings[neighbor].position)?;
            self.repo
                .set_position(siblings[neighbor].id, siblings[index].position)?;
            Ok::<_, TaskServiceError>(())
        })?;
        info!("event=task_reorder module=service status=ok task_id={id} direction={direction}");
        Ok(())
    }

    /// Makes a task the last child of its immediately preceding sibling.
    ///
    /// Returns the id of the new parent.
    pub fn indent(&self, id: TaskId) -> TaskServiceResult<TaskId> {
        let new_parent_id = self.repo.run_atomic(|| {
            let task = self.require_task(id)?;
            let siblings = self.repo.list_children(task.parent_id)?;
            let index = sibling_index(&siblings, id)?;
            let previous = index
                .checked_sub(1)
                .map(|previous| siblings[previous].id)
                .ok_or(TaskServiceError::NoPrecedingSibling(id))?;
            self.append_to_group(id, Some(previous))?;
            Ok::<_, TaskServiceError>(previous)
        })?;
        info!(
            "event=task_indent module=service status=ok task_id={id} parent_id={new_parent_id}"
        );
        Ok(new_parent_id)
    }

    /// Moves a task up one level, to the end of its grandparent's children.
    ///
    /// Returns the new parent (`None` for root level).
    pub fn outdent(&self, id: TaskId) -> TaskServiceResult<Option<TaskId>> {
        let new_parent_id = self.repo.run_atomic(|| {
            let task = self.require_task(id)?;
            let parent_id = task.parent_id.ok_or(TaskServiceError::AlreadyRoot(id))?;
            let grandparent_id = self
                .repo
                .get_task(parent_id)?
                .and_then(|parent| parent.parent_id);
            self.append_to_group(id, grandparent_id)?;
            Ok::<_, TaskServiceError>(grandparent_id)
        })?;
        info!(
            "event=task_outdent module=service status=ok task_id={id} parent_id={}",
            format_parent(new_parent_id)
        );
        Ok(new_parent_id)
    }

    /// Deletes every task. Returns the number of removed rows.
    pub fn clear_all(&self) -> TaskServiceResult<usize> {
        let removed = self.repo.delete_all()?;
        info!("event=task_clear module=service status=ok removed={removed}");
        Ok(removed)
    }

    fn require_task(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.repo
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))
    }

    fn ensure_parent_exists(&self, parent_id: TaskId) -> TaskServiceResult<()> {
        self.repo
            .get_task(parent_id)?
            .ok_or(TaskServiceError::ParentNotFound(parent_id))?;
        Ok(())
    }

    fn append_to_group(&self, id: TaskId, parent_id: Option<TaskId>) -> TaskServiceResult<()> {
        let position = self.repo.next_position(parent_id)?;
        self.repo.set_parent(id, parent_id, position)?;
        Ok(())
    }

    fn would_create_cycle(
        &self,
        task_id: TaskId,
        candidate_parent_id: TaskId,
    ) -> TaskServiceResult<bool> {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent_id);
        while let Some(current) = cursor {
            if current == task_id {
                return Ok(true);
            }
            if !visited.insert(current) {
                return Ok(true);
            }
            cursor = self
                .repo
                .get_task(current)?
                .ok_or(TaskServiceError::ParentNotFound(current))?
                .parent_id;
        }
        Ok(false)
    }
}

fn sibling_index(siblings: &[Task], id: TaskId) -> TaskServiceResult<usize> {
    siblings
        .iter()
        .position(|sibling| sibling.id == id)
        .ok_or(TaskServiceError::TaskNotFound(id))
}

fn format_parent(parent_id: Option<TaskId>) -> String {
    parent_id.map_or_else(|| "root".to_string(), |id| id.to_string())
}
