use nestdo_core::db::open_db_in_memory;
use nestdo_core::{
    MoveDirection, SqliteTaskRepository, TaskId, TaskRepository, TaskService, UndoStack,
    DEFAULT_UNDO_DEPTH,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn undo_on_empty_stack_reports_nothing_to_undo() {
    let conn = setup();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let mut undo = UndoStack::default();

    assert_eq!(undo.capacity(), DEFAULT_UNDO_DEPTH);
    assert!(!undo.can_undo());
    assert!(!undo.undo(&repo).unwrap());
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Delete,
    Complete,
    Rename,
    Move,
    Reorder,
    Indent,
    Clear,
}

struct Fixture {
    root: TaskId,
    child: TaskId,
    grandchild: TaskId,
    second: TaskId,
}

fn mutate(service: &TaskService<SqliteTaskRepository<'_>>, fixture: &Fixture, mutation: Mutation) {
    match mutation {
        Mutation::Delete => service.delete(fixture.root).unwrap(),
        Mutation::Complete => {
            service.complete(fixture.grandchild).unwrap();
        }
        Mutation::Rename => service.rename(fixture.child, "Renamed").unwrap(),
        Mutation::Move => service
            .move_task(fixture.second, Some(fixture.grandchild))
            .unwrap(),
        Mutation::Reorder => service
            .reorder_sibling(fixture.second, MoveDirection::Up)
            .unwrap(),
        Mutation::Indent => {
            service.indent(fixture.second).unwrap();
        }
        Mutation::Clear => {
            service.clear_all().unwrap();
        }
    }
}

#[test]
fn undo_restores_exact_record_set_after_each_mutation_kind() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
    let mut undo = UndoStack::default();

    let root = service.create("Root", None).unwrap();
    let child = service.create("Child", Some(root.id)).unwrap();
    let grandchild = service.create("Grandchild", Some(child.id)).unwrap();
    let second = service.create("Second", None).unwrap();
    let fixture = Fixture {
        root: root.id,
        child: child.id,
        grandchild: grandchild.id,
        second: second.id,
    };

    for mutation in [
        Mutation::Delete,
        Mutation::Complete,
        Mutation::Rename,
        Mutation::Move,
        Mutation::Reorder,
        Mutation::Indent,
        Mutation::Clear,
    ] {
        let before = service.list_tasks().unwrap();
        undo.snapshot(service.repo()).unwrap();
        mutate(&service, &fixture, mutation);
        assert_ne!(service.list_tasks().unwrap(), before, "{mutation:?}");

        assert!(undo.undo(service.repo()).unwrap());
        assert_eq!(service.list_tasks().unwrap(), before, "{mutation:?}");
        assert_eq!(undo.depth(), 0);
    }
}

#[test]
fn oldest_snapshots_are_evicted_beyond_capacity() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
    let mut undo = UndoStack::with_capacity(3);

    let mut states = Vec::new();
    for step in 0..5 {
        states.push(service.list_tasks().unwrap());
        undo.snapshot(service.repo()).unwrap();
        service.create(&format!("Task {step}"), None).unwrap();
    }
    assert_eq!(undo.depth(), 3);

    for expected in states[2..].iter().rev() {
        assert!(undo.undo(service.repo()).unwrap());
        assert_eq!(&service.list_tasks().unwrap(), expected);
    }
    assert!(!undo.undo(service.repo()).unwrap());
    assert_eq!(service.list_tasks().unwrap().len(), 2);
}

#[test]
fn undo_is_single_direction() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
    let mut undo = UndoStack::default();

    undo.snapshot(service.repo()).unwrap();
    service.create("Task", None).unwrap();

    assert!(undo.undo(service.repo()).unwrap());
    assert!(service.list_tasks().unwrap().is_empty());
    assert!(!undo.can_undo());
    assert!(!undo.undo(service.repo()).unwrap());
    assert!(service.list_tasks().unwrap().is_empty());
}

#[test]
fn cancel_snapshot_drops_newest_and_returns_evicted_entry() {
    let conn = setup();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let mut undo = UndoStack::with_capacity(0);
    assert_eq!(undo.capacity(), 1);

    assert!(undo.snapshot(&repo).unwrap().is_none());
    repo.create_task(None, "Kept").unwrap();

    let evicted = undo.snapshot(&repo).unwrap();
    assert_eq!(evicted.as_deref().map(<[_]>::len), Some(0));
    assert_eq!(undo.depth(), 1);

    assert!(undo.cancel_snapshot(evicted));
    assert_eq!(undo.depth(), 1);
    assert_eq!(repo.list_all().unwrap().len(), 1);

    // The surviving entry is the empty-store capture taken first.
    assert!(undo.undo(&repo).unwrap());
    assert!(repo.list_all().unwrap().is_empty());
    assert!(!undo.cancel_snapshot(None));
}

#[test]
fn restore_handles_children_sorting_before_parents() {
    let conn = setup();
    let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
    let mut undo = UndoStack::default();

    let a = service.create("A", None).unwrap();
    let b = service.create("B", None).unwrap();
    let c = service.create("C", None).unwrap();
    // C ends at root position 2 while its new child sits at position 0.
    let child = service.create("C child", Some(c.id)).unwrap();
    service.move_task(a.id, Some(b.id)).unwrap();
    let before = service.list_tasks().unwrap();
    let index_of = |id: TaskId| before.iter().position(|task| task.id == id).unwrap();
    assert!(index_of(child.id) < index_of(c.id));
    assert!(index_of(a.id) < index_of(b.id));

    undo.snapshot(service.repo()).unwrap();
    service.clear_all().unwrap();
    assert!(undo.undo(service.repo()).unwrap());

    assert_eq!(service.list_tasks().unwrap(), before);
}
