//! Task store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the persistent store surface: insert, point update/delete,
//!   ordered scans, sibling aggregates and the atomic write scope.
//! - Keep SQL and ordering details inside the repository boundary.
//!
//! # Invariants
//! - Scans are deterministic: `position ASC, id ASC`.
//! - New tasks are appended at `max(position) + 1` of their sibling group.
//! - Deleting a task removes its whole subtree (`ON DELETE CASCADE`).
//! - `run_atomic` scopes nest; an inner failure only rolls back its own scope.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::task::{new_task_id, Task, TaskId, TaskStatus};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    status,
    parent_id,
    position,
    created_at,
    updated_at
FROM tasks";

const NOW_MS_SQL: &str = "(CAST(strftime('%s', 'now') AS INTEGER) * 1000)";

/// Result type used by task store operations.
pub type TaskRepoResult<T> = Result<T, TaskRepoError>;

/// Errors from task store operations.
#[derive(Debug)]
pub enum TaskRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target task does not exist.
    TaskNotFound(TaskId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be converted into a `Task`.
    InvalidData(String),
}

impl Display for TaskRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "task store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "task store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid task data: {message}"),
        }
    }
}

impl Error for TaskRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TaskRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TaskRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Direct-children aggregate used for propagation and progress display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildStats {
    pub total: u32,
    pub done: u32,
}

impl ChildStats {
    /// True when there is at least one child and every child is done.
    pub fn all_done(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}

/// Persistent store interface for task records.
pub trait TaskRepository {
    /// Creates one task at the end of its sibling group.
    fn create_task(&self, parent_id: Option<TaskId>, title: &str) -> TaskRepoResult<Task>;
    /// Inserts a record verbatim, keeping its id, position and timestamps.
    fn insert_task(&self, task: &Task) -> TaskRepoResult<()>;
    /// Loads one task by id.
    fn get_task(&self, id: TaskId) -> TaskRepoResult<Option<Task>>;
    /// Full scan ordered by `position ASC, id ASC`.
    fn list_all(&self) -> TaskRepoResult<Vec<Task>>;
    /// Direct children of one parent (`None` = root group), in sibling order.
    fn list_children(&self, parent_id: Option<TaskId>) -> TaskRepoResult<Vec<Task>>;
    /// Counts direct children of one parent.
    fn child_stats(&self, parent_id: Option<TaskId>) -> TaskRepoResult<ChildStats>;
    /// Next free position in a sibling group (`0` when empty).
    fn next_position(&self, parent_id: Option<TaskId>) -> TaskRepoResult<i64>;
    fn rename_task(&self, id: TaskId, title: &str) -> TaskRepoResult<()>;
    fn set_status(&self, id: TaskId, status: TaskStatus) -> TaskRepoResult<()>;
    /// Reparents one task and assigns its position in the new group.
    fn set_parent(
        &self,
        id: TaskId,
        parent_id: Option<TaskId>,
        position: i64,
    ) -> TaskRepoResult<()>;
    fn set_position(&self, id: TaskId, position: i64) -> TaskRepoResult<()>;
    /// Deletes one task and, by cascade, all of its descendants.
    fn delete_task(&self, id: TaskId) -> TaskRepoResult<()>;
    /// Deletes every task. Returns the number of removed rows.
    fn delete_all(&self) -> TaskRepoResult<usize>;
    /// Runs `body` so that its writes commit together or not at all.
    fn run_atomic<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<TaskRepoError>;
}

/// SQLite-backed task store.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> TaskRepoResult<Self> {
        ensure_task_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, parent_id: Option<TaskId>, title: &str) -> TaskRepoResult<Task> {
        let id = new_task_id();
        let position = self.next_position(parent_id)?;
        self.conn.execute(
            "INSERT INTO tasks (id, title, status, parent_id, position)
             VALUES (?1, ?2, 'todo', ?3, ?4);",
            params![
                id.to_string(),
                title,
                parent_id.map(|value| value.to_string()),
                position,
            ],
        )?;
        self.get_task(id)?.ok_or(TaskRepoError::TaskNotFound(id))
    }

    fn insert_task(&self, task: &Task) -> TaskRepoResult<()> {
        self.conn.execute(
            "INSERT INTO tasks (
                id,
                title,
                status,
                parent_id,
                position,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                task.id.to_string(),
                task.title.as_str(),
                task.status.as_str(),
                task.parent_id.map(|value| value.to_string()),
                task.position,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> TaskRepoResult<Option<Task>> {
        self.conn
            .query_row(
                &format!("{TASK_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_task_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_all(&self) -> TaskRepoResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} ORDER BY position ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn list_children(&self, parent_id: Option<TaskId>) -> TaskRepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE parent_id IS ?1
             ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([parent_id.map(|value| value.to_string())])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn child_stats(&self, parent_id: Option<TaskId>) -> TaskRepoResult<ChildStats> {
        let (total, done): (u32, u32) = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0)
             FROM tasks
             WHERE parent_id IS ?1;",
            [parent_id.map(|value| value.to_string())],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(ChildStats { total, done })
    }

    fn next_position(&self, parent_id: Option<TaskId>) -> TaskRepoResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1
             FROM tasks
             WHERE parent_id IS ?1;",
            [parent_id.map(|value| value.to_string())],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn rename_task(&self, id: TaskId, title: &str) -> TaskRepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE tasks
                 SET title = ?2,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id.to_string(), title],
        )?;
        ensure_changed(changed, id)
    }

    fn set_status(&self, id: TaskId, status: TaskStatus) -> TaskRepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE tasks
                 SET status = ?2,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id.to_string(), status.as_str()],
        )?;
        ensure_changed(changed, id)
    }

    fn set_parent(
        &self,
        id: TaskId,
        parent_id: Option<TaskId>,
        position: i64,
    ) -> TaskRepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE tasks
                 SET parent_id = ?2,
                     position = ?3,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                id.to_string(),
                parent_id.map(|value| value.to_string()),
                position,
            ],
        )?;
        ensure_changed(changed, id)
    }

    fn set_position(&self, id: TaskId, position: i64) -> TaskRepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE tasks
                 SET position = ?2,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id.to_string(), position],
        )?;
        ensure_changed(changed, id)
    }

    fn delete_task(&self, id: TaskId) -> TaskRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, id)
    }

    fn delete_all(&self) -> TaskRepoResult<usize> {
        // Cascaded child deletes do not show up in the statement's change
        // count, so count up front.
        let total: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))?;
        self.conn.execute("DELETE FROM tasks;", [])?;
        Ok(total)
    }

    fn run_atomic<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<TaskRepoError>,
    {
        let scope = AtomicScope::begin(self.conn).map_err(TaskRepoError::from)?;
        let value = body()?;
        scope.commit().map_err(TaskRepoError::from)?;
        Ok(value)
    }
}

/// One level of `run_atomic`: the outermost level is an IMMEDIATE
/// transaction, inner levels are savepoints. Dropping an uncommitted scope
/// rolls it back.
struct AtomicScope<'conn> {
    conn: &'conn Connection,
    nested: bool,
    committed: bool,
}

impl<'conn> AtomicScope<'conn> {
    fn begin(conn: &'conn Connection) -> rusqlite::Result<Self> {
        let nested = !conn.is_autocommit();
        conn.execute_batch(if nested {
            "SAVEPOINT task_atomic;"
        } else {
            "BEGIN IMMEDIATE;"
        })?;
        Ok(Self {
            conn,
            nested,
            committed: false,
        })
    }

    fn commit(mut self) -> rusqlite::Result<()> {
        self.conn.execute_batch(if self.nested {
            "RELEASE task_atomic;"
        } else {
            "COMMIT;"
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for AtomicScope<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let sql = if self.nested {
            "ROLLBACK TO task_atomic; RELEASE task_atomic;"
        } else {
            "ROLLBACK;"
        };
        if let Err(err) = self.conn.execute_batch(sql) {
            warn!(
                "event=atomic_rollback module=repo status=error nested={} error={}",
                self.nested, err
            );
        }
    }
}

fn ensure_changed(changed: usize, id: TaskId) -> TaskRepoResult<()> {
    if changed == 0 {
        return Err(TaskRepoError::TaskNotFound(id));
    }
    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> TaskRepoResult<Task> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "tasks.id")?;

    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "tasks.parent_id"))
        .transpose()?;

    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        TaskRepoError::InvalidData(format!("invalid task status `{status_text}` in tasks.status"))
    })?;

    Ok(Task {
        id,
        title: row.get("title")?,
        status,
        parent_id,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> TaskRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| TaskRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_task_connection_ready(conn: &Connection) -> TaskRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(TaskRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "tasks")? {
        return Err(TaskRepoError::MissingRequiredTable("tasks"));
    }

    for column in [
        "id",
        "title",
        "status",
        "parent_id",
        "position",
        "created_at",
        "updated_at",
    ] {
        if !table_has_column(conn, "tasks", column)? {
            return Err(TaskRepoError::MissingRequiredColumn {
                table: "tasks",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> TaskRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> TaskRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
