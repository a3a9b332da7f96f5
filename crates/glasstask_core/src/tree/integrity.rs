//! Structural integrity checks for a flat task collection.
//!
//! # Responsibility
//! - Detect duplicate ids, dangling parents, level drift and ancestry cycles.
//! - Report findings without repairing them.

use crate::model::task::{Task, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Result of an integrity pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub total_tasks: usize,
}

/// Checks hierarchy invariants over `tasks`.
pub fn check_integrity(tasks: &[Task]) -> IntegrityReport {
    let mut issues = Vec::new();
    let mut by_id: HashMap<TaskId, &Task> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        if by_id.insert(task.id, task).is_some() {
            issues.push(format!("duplicate task id {}", task.id));
        }
        if task.id <= 0 {
            issues.push(format!("task id {} is not positive", task.id));
        }
    }

    let mut cyclic: HashSet<TaskId> = HashSet::new();
    for task in by_id.values() {
        let Some(parent_id) = task.parent_id else {
            if task.level != 0 {
                issues.push(format!(
                    "root task {} has level {}, expected 0",
                    task.id, task.level
                ));
            }
            continue;
        };

        let Some(parent) = by_id.get(&parent_id) else {
            issues.push(format!(
                "task {} references missing parent {}",
                task.id, parent_id
            ));
            continue;
        };

        if task.level != parent.level + 1 {
            issues.push(format!(
                "task {} has level {}, expected {}",
                task.id,
                task.level,
                parent.level + 1
            ));
        }

        if !cyclic.contains(&task.id) {
            if let Some(members) = ancestry_cycle(task.id, &by_id) {
                issues.push(format!("task {} is part of an ancestry cycle", task.id));
                cyclic.extend(members);
            }
        }
    }

    issues.sort();
    IntegrityReport {
        is_valid: issues.is_empty(),
        issues,
        total_tasks: by_id.len(),
    }
}

/// Walks up from `start`; returns the cycle members if the walk revisits a node.
fn ancestry_cycle(start: TaskId, by_id: &HashMap<TaskId, &Task>) -> Option<Vec<TaskId>> {
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if !seen.insert(current) {
            let cycle_start = path.iter().position(|id| *id == current)?;
            return Some(path[cycle_start..].to_vec());
        }
        path.push(current);
        cursor = by_id.get(&current).and_then(|task| task.parent_id);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::check_integrity;
    use crate::model::task::Task;

    #[test]
    fn consistent_tree_is_valid() {
        let root = Task::new_root(1, "root", 0);
        let child = Task::new_child(2, &root, "child", 0);

        let report = check_integrity(&[root, child]);
        assert!(report.is_valid);
        assert!(report.issues.is_empty());
        assert_eq!(report.total_tasks, 2);
    }

    #[test]
    fn reports_dangling_parent_and_level_drift() {
        let root = Task::new_root(1, "root", 0);
        let mut drifted = Task::new_child(2, &root, "child", 0);
        drifted.level = 3;
        let mut orphan = Task::new_root(3, "orphan", 0);
        orphan.parent_id = Some(42);
        orphan.level = 1;

        let report = check_integrity(&[root, drifted, orphan]);
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 2);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("missing parent 42")));
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("task 2 has level 3")));
    }

    #[test]
    fn reports_cycle_once() {
        let mut a = Task::new_root(1, "a", 0);
        let mut b = Task::new_root(2, "b", 0);
        a.parent_id = Some(2);
        a.level = 1;
        b.parent_id = Some(1);
        b.level = 2;

        let report = check_integrity(&[a, b]);
        let cycle_issues = report
            .issues
            .iter()
            .filter(|issue| issue.contains("cycle"))
            .count();
        assert_eq!(cycle_issues, 1);
    }

    #[test]
    fn reports_duplicates() {
        let first = Task::new_root(1, "a", 0);
        let second = Task::new_root(1, "b", 1);

        let report = check_integrity(&[first, second]);
        assert!(!report.is_valid);
        assert_eq!(report.total_tasks, 1);
        assert!(report.issues[0].contains("duplicate task id 1"));
    }
}
