//! Application services layered over the task repository.

pub mod app_service;
pub mod backup_scheduler;
