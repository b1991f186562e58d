use nestdo_core::db::open_db_in_memory;
use nestdo_core::{
    parse_operations, render_tree_listing, BatchOperation, InstructionError,
    InstructionProcessor, InstructionRequest, SqliteTaskRepository, TaskServiceError,
    TaskSession, TaskStatus, UndoStack,
};
use rusqlite::Connection;
use std::collections::HashSet;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn ship_release_scenario_auto_completes_parent() {
    let conn = setup();
    let mut session = TaskSession::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let ship = session
        .perform(|service| service.create("Ship release", None))
        .unwrap();
    let tests = session
        .perform(|service| service.create("Write tests", Some(ship.id)))
        .unwrap();
    let bug = session
        .perform(|service| service.create("Fix bug", Some(ship.id)))
        .unwrap();

    session
        .perform(|service| service.complete(tests.id))
        .unwrap();
    assert_eq!(
        session.service().get_task(ship.id).unwrap().status,
        TaskStatus::Todo
    );

    let propagated = session.perform(|service| service.complete(bug.id)).unwrap();
    assert_eq!(propagated, vec![ship.id]);

    let rows = session.view(&HashSet::new()).unwrap();
    assert_eq!(rows.len(), 3);
    let roots: Vec<_> = rows.iter().filter(|row| row.depth == 0).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].task.id, ship.id);
    assert_eq!(roots[0].task.status, TaskStatus::Done);
    assert_eq!((roots[0].done_children, roots[0].total_children), (2, 2));
    assert!(rows[1..].iter().all(|row| row.task.is_done() && row.depth == 1));
}

#[test]
fn failed_action_leaves_no_undo_entry() {
    let conn = setup();
    let mut session = TaskSession::new(SqliteTaskRepository::try_new(&conn).unwrap());

    session
        .perform(|service| service.create("Task", None))
        .unwrap();
    assert_eq!(session.undo_depth(), 1);

    let err = session
        .perform(|service| service.create("   ", None))
        .unwrap_err();
    assert!(matches!(err, TaskServiceError::InvalidTitle));
    assert_eq!(session.undo_depth(), 1);
}

#[test]
fn failed_action_at_full_capacity_keeps_every_undo_step() {
    let conn = setup();
    let mut session = TaskSession::with_undo(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        UndoStack::with_capacity(2),
    );

    session
        .perform(|service| service.create("A", None))
        .unwrap();
    session
        .perform(|service| service.create("B", None))
        .unwrap();
    assert_eq!(session.undo_depth(), 2);

    let missing = uuid::Uuid::now_v7();
    let err = session
        .perform(|service| service.delete(missing))
        .unwrap_err();
    assert!(matches!(err, TaskServiceError::Repo(_) | TaskServiceError::TaskNotFound(_)));
    assert_eq!(session.undo_depth(), 2);

    assert!(session.undo().unwrap());
    assert_eq!(session.service().list_tasks().unwrap().len(), 1);
    assert!(session.undo().unwrap());
    assert!(session.service().list_tasks().unwrap().is_empty());
    assert!(!session.can_undo());
}

#[test]
fn undo_walks_back_through_actions_then_stops() {
    let conn = setup();
    let mut session = TaskSession::with_undo(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        UndoStack::with_capacity(10),
    );

    let task = session
        .perform(|service| service.create("Task", None))
        .unwrap();
    session
        .perform(|service| service.rename(task.id, "Renamed"))
        .unwrap();

    assert!(session.undo().unwrap());
    assert_eq!(session.service().get_task(task.id).unwrap().title, "Task");
    assert!(session.undo().unwrap());
    assert!(session.service().list_tasks().unwrap().is_empty());
    assert!(!session.can_undo());
    assert!(!session.undo().unwrap());
}

#[test]
fn applied_batch_is_one_undo_step() {
    let conn = setup();
    let mut session = TaskSession::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let ops = parse_operations(
        r#"```json
        [
          {"op": "add", "id": "temp_1", "title": "Plan trip"},
          {"op": "add", "title": "Book flights", "parentId": "temp_1"},
          {"op": "add", "title": "Book hotel", "parentId": "temp_1"}
        ]
        ```"#,
    )
    .unwrap();
    let outcome = session.apply_operations(&ops).unwrap();
    assert_eq!(outcome.created.len(), 3);
    assert_eq!(session.undo_depth(), 1);

    assert!(session.undo().unwrap());
    assert!(session.service().list_tasks().unwrap().is_empty());
}

#[test]
fn rejected_batch_does_not_consume_undo_slot() {
    let conn = setup();
    let mut session = TaskSession::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let err = session
        .apply_operations(&[BatchOperation::Delete {
            task_id: "nope".to_string(),
        }])
        .unwrap_err();
    assert_eq!(err.index, Some(0));
    assert!(!session.can_undo());
}

#[test]
fn collapsed_view_hides_descendants() {
    let conn = setup();
    let mut session = TaskSession::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let parent = session
        .perform(|service| service.create("Parent", None))
        .unwrap();
    session
        .perform(|service| service.create("Child", Some(parent.id)))
        .unwrap();

    assert_eq!(session.view(&HashSet::new()).unwrap().len(), 2);
    let rows = session.view(&HashSet::from([parent.id])).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].has_children);
}

/// Processor that replays canned model output.
struct CannedProcessor {
    output: Result<&'static str, InstructionError>,
}

impl InstructionProcessor for CannedProcessor {
    fn propose(
        &self,
        request: &InstructionRequest,
    ) -> Result<Vec<BatchOperation>, InstructionError> {
        assert!(request.tree_listing.contains("Inbox"));
        parse_operations(self.output.clone()?)
    }
}

#[test]
fn processor_failure_never_reaches_the_store() {
    let conn = setup();
    let mut session = TaskSession::new(SqliteTaskRepository::try_new(&conn).unwrap());
    session
        .perform(|service| service.create("Inbox", None))
        .unwrap();

    let request = InstructionRequest {
        tree_listing: render_tree_listing(&session.service().tree().unwrap()),
        instruction: "do something".to_string(),
        previous: None,
    };

    for output in [
        Err(InstructionError::Unavailable("timeout".to_string())),
        Ok(""),
        Ok("no idea, sorry"),
    ] {
        let processor = CannedProcessor { output };
        assert!(processor.propose(&request).is_err());
    }
    assert_eq!(session.service().list_tasks().unwrap().len(), 1);
    assert_eq!(session.undo_depth(), 1);

    let processor = CannedProcessor { output: Ok("[]") };
    assert_eq!(processor.propose(&request).unwrap(), Vec::new());
}
