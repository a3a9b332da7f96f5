//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record and its nested read projection.
//! - Normalize and validate user-entered task text.
//!
//! # Invariants
//! - `id` is positive, assigned by the repository and never reused.
//! - `level` is `0` for root tasks and `parent.level + 1` otherwise.
//! - `children` only exists on `TaskNode` and is never persisted.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable task identifier assigned by the repository.
pub type TaskId = i64;

/// Maximum task text length in characters, after trimming.
pub const MAX_TASK_TEXT_CHARS: usize = 500;

/// Validation errors for user-provided task input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Text is blank after trim.
    EmptyText,
    /// Text exceeds `MAX_TASK_TEXT_CHARS` after trim.
    TextTooLong { chars: usize, max: usize },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "task text must not be blank"),
            Self::TextTooLong { chars, max } => {
                write!(f, "task text has {chars} characters; maximum is {max}")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// One to-do item in flat, parent-referencing form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    /// `None` means root-level task.
    pub parent_id: Option<TaskId>,
    pub level: u32,
    /// UI-state flag; forced `true` when a child is added.
    pub is_expanded: bool,
    /// Order among siblings, compared ascending with `id` as tie-break.
    pub sort_order: i64,
}

impl Task {
    /// Creates a root task with default flags.
    pub fn new_root(id: TaskId, text: impl Into<String>, sort_order: i64) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            parent_id: None,
            level: 0,
            is_expanded: true,
            sort_order,
        }
    }

    /// Creates a child task under `parent` with default flags.
    pub fn new_child(id: TaskId, parent: &Task, text: impl Into<String>, sort_order: i64) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            parent_id: Some(parent.id),
            level: parent.level + 1,
            is_expanded: true,
            sort_order,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Presentation ordering key among siblings.
    pub fn order_key(&self) -> (i64, TaskId) {
        (self.sort_order, self.id)
    }
}

/// Nested read projection of a task with its computed children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    pub fn leaf(task: Task) -> Self {
        Self {
            task,
            children: Vec::new(),
        }
    }
}

/// Persisted user settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub always_on_top: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            always_on_top: true,
        }
    }
}

/// Window focus state surfaced from the window-chrome collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    pub is_active: bool,
}

impl Default for WindowState {
    fn default() -> Self {
        Self { is_active: true }
    }
}

/// Completion counters across the whole hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self::default();
        for task in tasks {
            stats.total += 1;
            if task.completed {
                stats.completed += 1;
            } else {
                stats.pending += 1;
            }
        }
        stats
    }
}

/// Trims task text and enforces blank/length rules.
pub fn normalize_task_text(value: &str) -> Result<String, TaskValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskValidationError::EmptyText);
    }
    let chars = trimmed.chars().count();
    if chars > MAX_TASK_TEXT_CHARS {
        return Err(TaskValidationError::TextTooLong {
            chars,
            max: MAX_TASK_TEXT_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_task_text, Task, TaskNode, TaskStats, TaskValidationError};

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize_task_text("  Buy milk \n").unwrap(), "Buy milk");
        assert_eq!(
            normalize_task_text(" \t ").unwrap_err(),
            TaskValidationError::EmptyText
        );
    }

    #[test]
    fn normalize_counts_chars_not_bytes() {
        let accented = "é".repeat(500);
        assert!(normalize_task_text(&accented).is_ok());

        let err = normalize_task_text(&"a".repeat(501)).unwrap_err();
        assert_eq!(
            err,
            TaskValidationError::TextTooLong {
                chars: 501,
                max: 500
            }
        );
    }

    #[test]
    fn child_constructor_derives_level_and_parent() {
        let root = Task::new_root(1, "root", 0);
        let child = Task::new_child(2, &root, "child", 0);
        let grandchild = Task::new_child(3, &child, "grandchild", 4);

        assert_eq!(child.parent_id, Some(1));
        assert_eq!(child.level, 1);
        assert_eq!(grandchild.level, 2);
        assert_eq!(grandchild.order_key(), (4, 3));
        assert!(grandchild.is_expanded);
    }

    #[test]
    fn stats_count_completed_and_pending() {
        let mut done = Task::new_root(1, "a", 0);
        done.completed = true;
        let open = Task::new_root(2, "b", 1);

        let stats = TaskStats::from_tasks([&done, &open]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn node_serializes_with_camel_case_and_inline_children() {
        let root = Task::new_root(1, "root", 0);
        let child = Task::new_child(2, &root, "child", 0);
        let node = TaskNode {
            task: root,
            children: vec![TaskNode::leaf(child)],
        };

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["isExpanded"], true);
        assert_eq!(value["parentId"], serde_json::Value::Null);
        assert_eq!(value["children"][0]["parentId"], 1);
        assert_eq!(value["children"][0]["sortOrder"], 0);
    }
}
