//! Human and JSON rendering for CLI results.

use glasstask_core::{flatten_forest, IntegrityReport, Task, TaskNode, TaskStats};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Writes `value` as pretty JSON, or via `human` otherwise.
pub fn render<T: Serialize + ?Sized>(
    mode: OutputMode,
    value: &T,
    human: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if mode.is_json() {
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
    } else {
        human(value, &mut out)?;
    }
    Ok(())
}

/// One line per task, indented by depth; collapsed subtrees are hidden.
pub fn write_forest(forest: &[TaskNode], w: &mut dyn Write) -> io::Result<()> {
    if forest.is_empty() {
        return writeln!(w, "no tasks");
    }
    let mut hidden_below: Option<u32> = None;
    for task in flatten_forest(forest) {
        if let Some(level) = hidden_below {
            if task.level > level {
                continue;
            }
            hidden_below = None;
        }
        write_task_line(&task, w)?;
        if !task.is_expanded && has_children(forest, task.id) {
            hidden_below = Some(task.level);
        }
    }
    Ok(())
}

pub fn write_task_line(task: &Task, w: &mut dyn Write) -> io::Result<()> {
    let mark = if task.completed { "x" } else { " " };
    writeln!(
        w,
        "{:indent$}[{mark}] {} (#{})",
        "",
        task.text,
        task.id,
        indent = task.level as usize * 2
    )
}

pub fn write_stats(stats: &TaskStats, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{} tasks: {} completed, {} pending",
        stats.total, stats.completed, stats.pending
    )
}

pub fn write_integrity(report: &IntegrityReport, w: &mut dyn Write) -> io::Result<()> {
    if report.is_valid {
        return writeln!(w, "ok: {} tasks, no issues", report.total_tasks);
    }
    writeln!(
        w,
        "{} issue(s) in {} tasks:",
        report.issues.len(),
        report.total_tasks
    )?;
    for issue in &report.issues {
        writeln!(w, "  - {issue}")?;
    }
    Ok(())
}

fn has_children(forest: &[TaskNode], id: i64) -> bool {
    let mut stack: Vec<&TaskNode> = forest.iter().collect();
    while let Some(node) = stack.pop() {
        if node.task.id == id {
            return !node.children.is_empty();
        }
        stack.extend(node.children.iter());
    }
    false
}
