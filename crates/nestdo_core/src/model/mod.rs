//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by store, tree and engine.
//!
//! # Invariants
//! - Every task is identified by a stable, time-ordered `TaskId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod task;
