//! Arena-backed task forest.
//!
//! Nodes live in one `Vec` and reference children by index, so parent and
//! child never hold references to each other.

use crate::model::task::{Task, TaskId};
use std::collections::{HashMap, HashSet};

/// One task plus the arena indices of its direct children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub task: Task,
    pub children: Vec<usize>,
}

/// One visible row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    pub task: Task,
    /// `0` for root-level rows.
    pub depth: usize,
    /// Last row within its sibling group (tree-drawing hint).
    pub is_last: bool,
    pub has_children: bool,
    pub done_children: usize,
    pub total_children: usize,
}

/// Forest of root tasks rebuilt from one full store scan.
#[derive(Debug, Clone, Default)]
pub struct TaskForest {
    nodes: Vec<TreeNode>,
    index: HashMap<TaskId, usize>,
    roots: Vec<usize>,
}

impl TaskForest {
    /// Builds the forest in two passes over `tasks`.
    ///
    /// Sibling order follows input order, so callers pass records already
    /// sorted by `position, id` (as `list_all` returns them). A task whose
    /// parent is missing from the input, or that names itself as parent,
    /// becomes a root.
    pub fn build(tasks: Vec<Task>) -> Self {
        let mut nodes = Vec::with_capacity(tasks.len());
        let mut index = HashMap::with_capacity(tasks.len());
        for task in tasks {
            index.insert(task.id, nodes.len());
            nodes.push(TreeNode {
                task,
                children: Vec::new(),
            });
        }

        let mut roots = Vec::new();
        for position in 0..nodes.len() {
            let parent = nodes[position]
                .task
                .parent_id
                .and_then(|parent_id| index.get(&parent_id).copied())
                .filter(|parent| *parent != position);
            match parent {
                Some(parent) => nodes[parent].children.push(position),
                None => roots.push(position),
            }
        }

        Self {
            nodes,
            index,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&TreeNode> {
        self.index.get(&id).map(|position| &self.nodes[*position])
    }

    /// Root nodes in sibling order.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.roots.iter().map(|position| &self.nodes[*position])
    }

    /// Direct children of `id` in sibling order; empty when `id` is unknown.
    pub fn children(&self, id: TaskId) -> impl Iterator<Item = &TreeNode> + '_ {
        self.get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|position| &self.nodes[*position])
    }

    /// Every task, parents strictly before their children.
    pub fn preorder(&self) -> Vec<&Task> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(position) = stack.pop() {
            let node = &self.nodes[position];
            ordered.push(&node.task);
            stack.extend(node.children.iter().rev().copied());
        }
        ordered
    }

    /// Depth-annotated display rows.
    ///
    /// Collapsed tasks still produce their own row; only their descendants
    /// are skipped.
    pub fn flatten(&self, collapsed: &HashSet<TaskId>) -> Vec<FlatRow> {
        let mut rows = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, usize, bool)> = Vec::new();
        push_group(&mut stack, &self.roots, 0);

        while let Some((position, depth, is_last)) = stack.pop() {
            let node = &self.nodes[position];
            let done_children = node
                .children
                .iter()
                .filter(|child| self.nodes[**child].task.is_done())
                .count();
            rows.push(FlatRow {
                task: node.task.clone(),
                depth,
                is_last,
                has_children: !node.children.is_empty(),
                done_children,
                total_children: node.children.len(),
            });

            if !collapsed.contains(&node.task.id) {
                push_group(&mut stack, &node.children, depth + 1);
            }
        }
        rows
    }
}

fn push_group(stack: &mut Vec<(usize, usize, bool)>, group: &[usize], depth: usize) {
    let last = group.len().saturating_sub(1);
    for (offset, position) in group.iter().enumerate().rev() {
        stack.push((*position, depth, offset == last));
    }
}
