//! Task tree projections.
//!
//! # Responsibility
//! - Rebuild the parent/child hierarchy from flat store records.
//! - Produce the flattened, depth-annotated rows a frontend renders.
//!
//! # Invariants
//! - Projections are disposable; the store stays the only source of truth.
//! - No task is dropped: orphans surface at root level.

mod forest;

pub use forest::{FlatRow, TaskForest, TreeNode};
