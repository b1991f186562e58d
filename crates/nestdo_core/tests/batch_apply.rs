use nestdo_core::db::open_db_in_memory;
use nestdo_core::{
    apply_batch, BatchFailure, BatchOperation, SqliteTaskRepository, TaskService,
    TaskServiceError, TaskStatus,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn add(temp_id: Option<&str>, title: &str, parent_id: Option<&str>) -> BatchOperation {
    BatchOperation::Add {
        id: temp_id.map(str::to_string),
        title: title.to_string(),
        parent_id: parent_id.map(str::to_string),
    }
}

#[test]
fn later_operations_resolve_temporary_ids() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let outcome = apply_batch(
        &service,
        &[add(Some("temp_1"), "A", None), add(None, "B", Some("temp_1"))],
    )
    .unwrap();

    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.created.len(), 2);
    let a_id = outcome.temp_ids["temp_1"];
    assert_eq!(outcome.created[0], a_id);

    let b = service.get_task(outcome.created[1]).unwrap();
    assert_eq!(b.title, "B");
    assert_eq!(b.parent_id, Some(a_id));
    assert_eq!(service.get_task(a_id).unwrap().title, "A");
}

#[test]
fn batch_mixes_real_and_temporary_ids() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
    let existing = service.create("Existing", None).unwrap();
    let doomed = service.create("Doomed", None).unwrap();
    let real = existing.id.to_string();

    let ops = vec![
        add(Some("n1"), "New parent", None),
        BatchOperation::Move {
            task_id: real.clone(),
            new_parent_id: Some("n1".to_string()),
        },
        BatchOperation::Update {
            task_id: real.clone(),
            title: "Existing, renamed".to_string(),
        },
        BatchOperation::Done { task_id: real },
        BatchOperation::Delete {
            task_id: doomed.id.to_string(),
        },
    ];
    let outcome = apply_batch(&service, &ops).unwrap();
    let parent_id = outcome.temp_ids["n1"];

    let moved = service.get_task(existing.id).unwrap();
    assert_eq!(moved.parent_id, Some(parent_id));
    assert_eq!(moved.title, "Existing, renamed");
    assert_eq!(moved.status, TaskStatus::Done);
    // `done` goes through propagation: the only child is done.
    assert_eq!(service.get_task(parent_id).unwrap().status, TaskStatus::Done);
    assert!(service
        .list_tasks()
        .unwrap()
        .iter()
        .all(|task| task.id != doomed.id));
}

#[test]
fn failing_operation_rolls_back_whole_batch() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
    let survivor = service.create("Survivor", None).unwrap();
    let before = service.list_tasks().unwrap();
    let missing = Uuid::now_v7();

    let err = apply_batch(
        &service,
        &[
            add(Some("temp_1"), "A", None),
            BatchOperation::Update {
                task_id: survivor.id.to_string(),
                title: "Changed".to_string(),
            },
            add(None, "B", Some("temp_1")),
            BatchOperation::Done {
                task_id: missing.to_string(),
            },
        ],
    )
    .unwrap_err();

    assert_eq!(err.index, Some(3));
    assert_eq!(err.op, Some("done"));
    assert!(matches!(
        err.failure,
        BatchFailure::Service(TaskServiceError::TaskNotFound(id)) if id == missing
    ));
    assert_eq!(service.list_tasks().unwrap(), before);
}

#[test]
fn unresolvable_reference_rolls_back_whole_batch() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let err = apply_batch(
        &service,
        &[
            add(Some("temp_1"), "A", None),
            add(None, "B", Some("temp_2")),
        ],
    )
    .unwrap_err();

    assert_eq!(err.index, Some(1));
    assert!(matches!(err.failure, BatchFailure::UnresolvedId(ref value) if value == "temp_2"));
    assert!(err.to_string().contains("operation #2 (add)"));
    assert!(service.list_tasks().unwrap().is_empty());
}

#[test]
fn forward_reference_to_later_add_is_not_reordered() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let err = apply_batch(
        &service,
        &[
            add(None, "Child", Some("parent")),
            add(Some("parent"), "Parent", None),
        ],
    )
    .unwrap_err();

    assert_eq!(err.index, Some(0));
    assert!(service.list_tasks().unwrap().is_empty());
}

#[test]
fn invalid_title_and_cycles_fail_the_batch() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let err = apply_batch(&service, &[add(Some("t"), "  ", None)]).unwrap_err();
    assert!(matches!(
        err.failure,
        BatchFailure::Service(TaskServiceError::InvalidTitle)
    ));

    let err = apply_batch(
        &service,
        &[
            add(Some("p"), "Parent", None),
            add(Some("c"), "Child", Some("p")),
            BatchOperation::Move {
                task_id: "p".to_string(),
                new_parent_id: Some("c".to_string()),
            },
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err.failure,
        BatchFailure::Service(TaskServiceError::CycleDetected { .. })
    ));
    assert!(service.list_tasks().unwrap().is_empty());
}

#[test]
fn empty_batch_commits_nothing() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());

    let outcome = apply_batch(&service, &[]).unwrap();
    assert_eq!(outcome.applied, 0);
    assert!(outcome.created.is_empty());
}
