//! Persistent store layer.
//!
//! # Responsibility
//! - Define the task store contract the engine, undo and batch layers use.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`TaskNotFound`) in addition to
//!   DB transport errors.

pub mod task_repo;
