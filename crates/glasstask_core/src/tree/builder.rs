//! Flat task collection to nested forest projection.
//!
//! # Responsibility
//! - Assemble parent-referencing tasks into a nested forest.
//! - Provide deterministic `(sort_order, id)` ordering at every level.
//!
//! # Invariants
//! - Input is never mutated; output nodes are owned copies.
//! - Tasks whose parent is absent from the input are dropped from the view,
//!   together with their subtrees.
//! - Traversal uses explicit stacks, so depth is bounded by heap, not stack.

use crate::model::task::{Task, TaskId, TaskNode};
use std::collections::{HashMap, HashSet};

/// Builds a nested forest from a flat task collection.
///
/// Children keep the relative order they have in `flat_tasks`; callers that
/// need presentation order apply [`sort_forest`]. When the same id appears
/// more than once, the first occurrence wins.
pub fn build_forest(flat_tasks: &[Task]) -> Vec<TaskNode> {
    let mut by_id: HashMap<TaskId, &Task> = HashMap::with_capacity(flat_tasks.len());
    let mut unique = Vec::with_capacity(flat_tasks.len());
    for task in flat_tasks {
        if !by_id.contains_key(&task.id) {
            by_id.insert(task.id, task);
            unique.push(task);
        }
    }

    let mut children_of: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    let mut roots = Vec::new();
    for task in &unique {
        match task.parent_id {
            None => roots.push(task.id),
            Some(parent_id) if by_id.contains_key(&parent_id) => {
                children_of.entry(parent_id).or_default().push(task.id);
            }
            Some(_) => {}
        }
    }

    // Post-order assembly: a node is finished once all its children are.
    let mut finished: HashMap<TaskId, TaskNode> = HashMap::new();
    let mut entered: HashSet<TaskId> = HashSet::new();
    let mut stack: Vec<TaskId> = roots.iter().rev().copied().collect();
    while let Some(id) = stack.last().copied() {
        if entered.insert(id) {
            if let Some(children) = children_of.get(&id) {
                stack.extend(children.iter().rev().copied());
            }
            continue;
        }
        stack.pop();
        let mut node = TaskNode::leaf(by_id[&id].clone());
        if let Some(ids) = children_of.get(&id) {
            node.children = ids
                .iter()
                .filter_map(|child_id| finished.remove(child_id))
                .collect();
        }
        finished.insert(id, node);
    }

    roots
        .into_iter()
        .filter_map(|id| finished.remove(&id))
        .collect()
}

/// Sorts every level of `forest` by `(sort_order, id)` ascending.
pub fn sort_forest(forest: &mut Vec<TaskNode>) {
    let mut pending: Vec<&mut Vec<TaskNode>> = vec![forest];
    while let Some(level) = pending.pop() {
        level.sort_by_key(|node| node.task.order_key());
        for node in level {
            pending.push(&mut node.children);
        }
    }
}

/// Flattens a forest in pre-order (parent before children).
pub fn flatten_forest(forest: &[TaskNode]) -> Vec<Task> {
    let mut flat = Vec::new();
    let mut stack: Vec<&TaskNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        flat.push(node.task.clone());
        stack.extend(node.children.iter().rev());
    }
    flat
}
