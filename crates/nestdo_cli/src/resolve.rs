//! Task references typed on the command line.
//!
//! A positive integer is a 1-based row of the fully expanded listing printed
//! by `nestdo list`. Anything else, including an all-digit ref past the last
//! row, is a case-insensitive id prefix that must match exactly one task.

use anyhow::{bail, Result};
use nestdo_core::{FlatRow, TaskId};

pub fn resolve_ref(rows: &[FlatRow], reference: &str) -> Result<TaskId> {
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("task reference cannot be empty");
    }

    let row_number = reference.parse::<usize>().ok();
    if let Some(row) = row_number
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| rows.get(index))
    {
        return Ok(row.task.id);
    }

    let needle = reference.to_ascii_lowercase();
    let mut matches = rows
        .iter()
        .map(|row| row.task.id)
        .filter(|id| id.to_string().starts_with(&needle));
    match (matches.next(), matches.next(), row_number) {
        (Some(id), None, _) => Ok(id),
        (Some(_), Some(_), _) => {
            bail!("task reference `{reference}` is ambiguous; use a longer prefix")
        }
        (None, _, Some(number)) => {
            bail!("no task at row {number} (listing has {} rows)", rows.len())
        }
        (None, _, None) => bail!("no task matches `{reference}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_ref;
    use nestdo_core::{FlatRow, Task, TaskForest, TaskStatus};
    use std::collections::HashSet;
    use uuid::Uuid;

    fn task(id: &str, parent_id: Option<Uuid>, position: i64) -> Task {
        Task {
            id: Uuid::parse_str(id).unwrap(),
            title: format!("task {position}"),
            status: TaskStatus::Todo,
            parent_id,
            position,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn rows() -> Vec<FlatRow> {
        let root = task("0192a000-0000-7000-8000-000000000001", None, 0);
        let child = task("0192a000-0000-7000-8000-000000000002", Some(root.id), 0);
        let other = task("01921110-0000-7000-8000-000000000003", None, 1);
        TaskForest::build(vec![root, child, other]).flatten(&HashSet::new())
    }

    #[test]
    fn numbers_follow_listing_order() {
        let rows = rows();
        assert_eq!(resolve_ref(&rows, "1").unwrap(), rows[0].task.id);
        assert_eq!(resolve_ref(&rows, "2").unwrap(), rows[1].task.id);
        assert_eq!(rows[1].depth, 1);
        assert!(resolve_ref(&rows, "0").is_err());
        assert!(resolve_ref(&rows, "4").is_err());
    }

    #[test]
    fn prefixes_must_be_unique() {
        let rows = rows();
        assert_eq!(
            resolve_ref(&rows, "0192A000-0000-7000-8000-000000000002").unwrap(),
            rows[1].task.id
        );
        let err = resolve_ref(&rows, "0192a").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
        assert!(resolve_ref(&rows, "ffff").is_err());
        assert!(resolve_ref(&rows, "  ").is_err());
    }

    #[test]
    fn digit_only_prefix_past_last_row_matches_ids() {
        let rows = rows();
        assert_eq!(resolve_ref(&rows, "01921").unwrap(), rows[2].task.id);
        let err = resolve_ref(&rows, "0192").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
        let err = resolve_ref(&rows, "9").unwrap_err();
        assert!(err.to_string().contains("no task at row 9"));
    }
}
