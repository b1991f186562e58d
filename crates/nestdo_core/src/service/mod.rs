//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into task-level operations.
//! - Keep frontends and the batch applier decoupled from SQL.

pub mod task_service;
