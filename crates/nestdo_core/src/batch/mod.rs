//! Batch operation applier.
//!
//! # Responsibility
//! - Define the closed set of operations an instruction processor may emit.
//! - Apply an ordered list of them in one atomic scope, resolving temporary
//!   ids of tasks created earlier in the same batch.
//!
//! # Invariants
//! - All-or-nothing: any failing operation rolls back the whole batch,
//!   including operations before it and id-resolution failures.
//! - Operations run strictly in input order; nothing is reordered.

use crate::model::task::TaskId;
use crate::repo::task_repo::{TaskRepoError, TaskRepository};
use crate::service::task_service::{TaskService, TaskServiceError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// One requested mutation. Ids are either real task ids or temporary ids
/// introduced by an earlier `Add` in the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOperation {
    Add {
        /// Temporary id later operations may reference.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        title: String,
        #[serde(default, rename = "parentId", skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
    },
    Delete {
        #[serde(rename = "taskId")]
        task_id: String,
    },
    Move {
        #[serde(rename = "taskId")]
        task_id: String,
        /// `None` moves the task to root level.
        #[serde(default, rename = "newParentId")]
        new_parent_id: Option<String>,
    },
    Update {
        #[serde(rename = "taskId")]
        task_id: String,
        title: String,
    },
    Done {
        #[serde(rename = "taskId")]
        task_id: String,
    },
}

impl BatchOperation {
    /// Wire name of the operation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Delete { .. } => "delete",
            Self::Move { .. } => "move",
            Self::Update { .. } => "update",
            Self::Done { .. } => "done",
        }
    }
}

/// Why one batch operation failed.
#[derive(Debug)]
pub enum BatchFailure {
    /// Reference is neither a known temporary id nor a valid task id.
    UnresolvedId(String),
    /// The engine rejected the operation.
    Service(TaskServiceError),
}

/// Batch failure; nothing from the batch was applied.
#[derive(Debug)]
pub struct BatchError {
    /// Zero-based index of the failing operation, `None` when the atomic
    /// scope itself failed.
    pub index: Option<usize>,
    pub op: Option<&'static str>,
    pub failure: BatchFailure,
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let (Some(index), Some(op)) = (self.index, self.op) {
            write!(f, "operation #{} ({op}) failed: ", index + 1)?;
        }
        match &self.failure {
            BatchFailure::UnresolvedId(value) => write!(f, "unknown task reference `{value}`"),
            BatchFailure::Service(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.failure {
            BatchFailure::Service(err) => Some(err),
            BatchFailure::UnresolvedId(_) => None,
        }
    }
}

impl From<TaskRepoError> for BatchError {
    fn from(value: TaskRepoError) -> Self {
        Self {
            index: None,
            op: None,
            failure: BatchFailure::Service(value.into()),
        }
    }
}

/// Result of a committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Number of operations executed.
    pub applied: usize,
    /// Real ids of tasks created by `Add`, in batch order.
    pub created: Vec<TaskId>,
    /// Temporary id to real id mapping built during the batch.
    pub temp_ids: HashMap<String, TaskId>,
}

/// Applies `operations` in order inside one atomic scope.
pub fn apply_batch<R: TaskRepository>(
    service: &TaskService<R>,
    operations: &[BatchOperation],
) -> Result<BatchOutcome, BatchError> {
    let result: Result<BatchOutcome, BatchError> = service.repo().run_atomic(|| {
        let mut outcome = BatchOutcome::default();
        for (index, operation) in operations.iter().enumerate() {
            apply_one(service, operation, &mut outcome).map_err(|failure| BatchError {
                index: Some(index),
                op: Some(operation.kind()),
                failure,
            })?;
            outcome.applied += 1;
        }
        Ok(outcome)
    });

    match &result {
        Ok(outcome) => info!(
            "event=batch_apply module=batch status=ok applied={} created={}",
            outcome.applied,
            outcome.created.len()
        ),
        Err(err) => warn!(
            "event=batch_apply module=batch status=rolled_back total={} failed_index={} error={}",
            operations.len(),
            err.index.map_or_else(|| "none".to_string(), |index| index.to_string()),
            err
        ),
    }
    result
}

fn apply_one<R: TaskRepository>(
    service: &TaskService<R>,
    operation: &BatchOperation,
    outcome: &mut BatchOutcome,
) -> Result<(), BatchFailure> {
    let resolve = |reference: &str| resolve_id(&outcome.temp_ids, reference);
    match operation {
        BatchOperation::Add {
            id,
            title,
            parent_id,
        } => {
            let parent_id = parent_id.as_deref().map(resolve).transpose()?;
            let task = service
                .create(title, parent_id)
                .map_err(BatchFailure::Service)?;
            if let Some(temp_id) = id {
                outcome.temp_ids.insert(temp_id.clone(), task.id);
            }
            outcome.created.push(task.id);
        }
        BatchOperation::Delete { task_id } => {
            let task_id = resolve(task_id)?;
            service.delete(task_id).map_err(BatchFailure::Service)?;
        }
        BatchOperation::Move {
            task_id,
            new_parent_id,
        } => {
            let task_id = resolve(task_id)?;
            let new_parent_id = new_parent_id.as_deref().map(resolve).transpose()?;
            service
                .move_task(task_id, new_parent_id)
                .map_err(BatchFailure::Service)?;
        }
        BatchOperation::Update { task_id, title } => {
            let task_id = resolve(task_id)?;
            service
                .rename(task_id, title)
                .map_err(BatchFailure::Service)?;
        }
        BatchOperation::Done { task_id } => {
            let task_id = resolve(task_id)?;
            service.complete(task_id).map_err(BatchFailure::Service)?;
        }
    }
    Ok(())
}

fn resolve_id(temp_ids: &HashMap<String, TaskId>, reference: &str) -> Result<TaskId, BatchFailure> {
    let reference = reference.trim();
    if let Some(real) = temp_ids.get(reference) {
        return Ok(*real);
    }
    Uuid::parse_str(reference).map_err(|_| BatchFailure::UnresolvedId(reference.to_string()))
}
