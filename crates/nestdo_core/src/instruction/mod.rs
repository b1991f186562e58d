//! Boundary to the external natural-language instruction processor.
//!
//! # Responsibility
//! - Describe what the processor receives and returns.
//! - Render the task tree as the indented listing processors read.
//! - Turn free-form processor output into typed batch operations.
//!
//! # Invariants
//! - Nothing here writes to the store; callers apply the returned
//!   operations explicitly, so abandoning a request has no side effects.
//! - Failure (`Err`) is always distinguishable from "no operations" (`Ok(vec![])`).

mod listing;
mod parse;

pub use listing::{render_prompt, render_tree_listing};
pub use parse::parse_operations;

use crate::batch::BatchOperation;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// The proposal a revision request refers back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousProposal {
    pub instruction: String,
    pub operations: Vec<BatchOperation>,
}

/// Input handed to an instruction processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRequest {
    /// Output of `render_tree_listing` for the current tree.
    pub tree_listing: String,
    pub instruction: String,
    /// Set when the user asks to revise an earlier proposal.
    pub previous: Option<PreviousProposal>,
}

/// Processor failure. The store is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    /// Processor could not be reached, timed out or refused.
    Unavailable(String),
    /// Processor answered with nothing.
    EmptyResponse,
    /// Processor answered, but no valid operation list could be read.
    Malformed(String),
}

impl Display for InstructionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "instruction processor unavailable: {reason}"),
            Self::EmptyResponse => write!(f, "instruction processor returned an empty response"),
            Self::Malformed(reason) => {
                write!(f, "instruction processor output is malformed: {reason}")
            }
        }
    }
}

impl Error for InstructionError {}

/// External component that turns an instruction into batch operations.
///
/// Timeouts and retries belong to the implementation.
pub trait InstructionProcessor {
    fn propose(
        &self,
        request: &InstructionRequest,
    ) -> Result<Vec<BatchOperation>, InstructionError>;
}
