//! Task domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep the flat persisted shape separate from the nested read view.
//!
//! # Invariants
//! - Every task is identified by a stable, never-reused `TaskId`.
//! - Deletion is a hard delete of the task and its whole subtree.

pub mod task;
