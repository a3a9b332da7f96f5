//! Repository layer over the durable store.
//!
//! # Responsibility
//! - Own the canonical task collection and its locking discipline.
//! - Translate storage failures into rollbacks plus semantic errors.
//!
//! # Invariants
//! - Repository writes validate input before touching state.
//! - Repository APIs return semantic errors (`NotFound`, `Validation`) in
//!   addition to persistence failures.

pub mod task_repo;
