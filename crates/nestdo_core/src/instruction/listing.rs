//! Human-readable tree listing and prompt text for instruction processors.

use super::InstructionRequest;
use crate::tree::TaskForest;
use std::collections::HashSet;
use std::fmt::Write;

const INDENT: &str = "  ";

/// Renders every task as `- [ ] title (id: <uuid>)`, two spaces per level.
///
/// Returns `(empty)` for an empty forest so processors always see a body.
pub fn render_tree_listing(forest: &TaskForest) -> String {
    if forest.is_empty() {
        return "(empty)\n".to_string();
    }

    let mut listing = String::new();
    for row in forest.flatten(&HashSet::new()) {
        let mark = if row.task.is_done() { 'x' } else { ' ' };
        let _ = writeln!(
            listing,
            "{}- [{mark}] {} (id: {})",
            INDENT.repeat(row.depth),
            row.task.title,
            row.task.id
        );
    }
    listing
}

/// Builds the plain-text prompt for text-model backed processors.
pub fn render_prompt(request: &InstructionRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Current tasks:");
    prompt.push_str(&request.tree_listing);
    let _ = writeln!(prompt);

    if let Some(previous) = &request.previous {
        let operations =
            serde_json::to_string(&previous.operations).unwrap_or_else(|_| "[]".to_string());
        let _ = writeln!(prompt, "Previous instruction: {}", previous.instruction);
        let _ = writeln!(prompt, "Previously proposed operations: {operations}");
        let _ = writeln!(prompt, "Revise the proposal according to the new instruction.");
        let _ = writeln!(prompt);
    }

    let _ = writeln!(prompt, "Instruction: {}", request.instruction);
    let _ = writeln!(
        prompt,
        "Answer with a JSON array of operations: add {{id?, title, parentId?}}, \
         delete {{taskId}}, move {{taskId, newParentId?}}, update {{taskId, title}}, \
         done {{taskId}}. Each object carries its kind in \"op\"."
    );
    prompt
}
