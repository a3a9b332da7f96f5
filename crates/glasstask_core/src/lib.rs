//! Core of the glass task widget: a hierarchical to-do store.
//!
//! Tasks live in one in-memory collection guarded by a lock; every mutation
//! is written to an SQLite snapshot before it becomes visible. A background
//! scheduler keeps a second snapshot as a backup for recovery on startup.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod tree;

pub use config::{default_data_dir, ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::task::{
    normalize_task_text, Settings, Task, TaskId, TaskNode, TaskStats, TaskValidationError,
    WindowState, MAX_TASK_TEXT_CHARS,
};
pub use repo::task_repo::{RepoError, RepoResult, TaskRepository, NEVER_BACKED_UP};
pub use service::app_service::{AppService, NoopWindowChrome, WindowChrome};
pub use service::backup_scheduler::{BackupScheduler, DEFAULT_BACKUP_INTERVAL};
pub use store::{DurableStore, SqliteStore, StoreError, StoreResult, StoreState};
pub use tree::builder::{build_forest, flatten_forest, sort_forest};
pub use tree::integrity::{check_integrity, IntegrityReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
