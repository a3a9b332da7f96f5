//! Read-side hierarchy projections.
//!
//! # Responsibility
//! - Turn the flat stored collection into nested, ordered views.
//! - Check hierarchy invariants without touching storage.
//!
//! # Invariants
//! - Functions here are pure: no I/O, no locking, no input mutation.

pub mod builder;
pub mod integrity;
