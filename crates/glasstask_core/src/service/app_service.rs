//! Application facade consumed by the UI layer.
//!
//! # Responsibility
//! - Bootstrap data directory, store, repository and backup schedule.
//! - Bridge settings changes and focus events to the window chrome.
//!
//! # Invariants
//! - The window chrome is only notified after a setting is durably saved.
//! - Failing to create the data directory is the only fatal startup error.

use crate::config::{ConfigError, CoreConfig};
use crate::model::task::{TaskStats, WindowState};
use crate::repo::task_repo::{RepoResult, TaskRepository};
use crate::service::backup_scheduler::BackupScheduler;
use crate::store::{DurableStore, SqliteStore};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Window-management collaborator owned by the GUI shell.
pub trait WindowChrome: Send + Sync {
    /// Applies the always-on-top flag to the native window.
    fn set_always_on_top(&self, on_top: bool);
}

/// Window chrome that ignores every request; used by headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWindowChrome;

impl WindowChrome for NoopWindowChrome {
    fn set_always_on_top(&self, _on_top: bool) {}
}

/// Facade over repository, backups and window state.
pub struct AppService<S: DurableStore + 'static> {
    repo: Arc<TaskRepository<S>>,
    chrome: Box<dyn WindowChrome>,
    window_state: Mutex<WindowState>,
    scheduler: Option<BackupScheduler>,
}

impl AppService<SqliteStore> {
    /// Prepares the data directory and opens the SQLite-backed repository.
    ///
    /// # Errors
    /// - Returns `ConfigError::CreateDataDir` when the directory cannot be created.
    pub fn open(config: &CoreConfig, chrome: Box<dyn WindowChrome>) -> Result<Self, ConfigError> {
        config.ensure_data_dir()?;
        let repo = TaskRepository::open(SqliteStore::in_dir(&config.data_dir));
        Ok(Self::new(Arc::new(repo), chrome))
    }
}

impl<S: DurableStore + 'static> AppService<S> {
    pub fn new(repo: Arc<TaskRepository<S>>, chrome: Box<dyn WindowChrome>) -> Self {
        Self {
            repo,
            chrome,
            window_state: Mutex::new(WindowState::default()),
            scheduler: None,
        }
    }

    /// Applies persisted settings to the window and starts periodic backups.
    ///
    /// A scheduler that cannot be spawned is logged; the app keeps running
    /// with manual backups only.
    pub fn startup(&mut self, backup_interval: Duration) {
        self.chrome.set_always_on_top(self.repo.is_always_on_top());
        if self.scheduler.is_some() {
            return;
        }
        match BackupScheduler::start(Arc::clone(&self.repo), backup_interval) {
            Ok(scheduler) => self.scheduler = Some(scheduler),
            Err(err) => warn!(
                "event=app_startup module=service status=error stage=backup_scheduler error={}",
                err
            ),
        }
        info!("event=app_startup module=service status=ok");
    }

    /// Stops periodic backups and waits for any in-flight backup.
    pub fn shutdown(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
        info!("event=app_shutdown module=service status=ok");
    }

    /// Shared handle to the repository for task operations.
    pub fn repo(&self) -> &Arc<TaskRepository<S>> {
        &self.repo
    }

    pub fn is_backup_scheduled(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn is_always_on_top(&self) -> bool {
        self.repo.is_always_on_top()
    }

    /// Persists the flipped flag, then notifies the window chrome.
    pub fn toggle_always_on_top(&self) -> RepoResult<bool> {
        let on_top = self.repo.toggle_always_on_top()?;
        self.chrome.set_always_on_top(on_top);
        Ok(on_top)
    }

    /// Writes a backup synchronously.
    pub fn force_backup(&self) -> RepoResult<i64> {
        self.repo.force_backup()
    }

    /// Last backup as local time, or `"never"`.
    pub fn last_backup_time(&self) -> String {
        self.repo.last_backup_time()
    }

    pub fn stats(&self) -> TaskStats {
        self.repo.stats()
    }

    pub fn on_window_focus(&self) -> WindowState {
        self.set_window_active(true)
    }

    pub fn on_window_blur(&self) -> WindowState {
        self.set_window_active(false)
    }

    pub fn window_state(&self) -> WindowState {
        *self.window_state.lock()
    }

    fn set_window_active(&self, is_active: bool) -> WindowState {
        let mut state = self.window_state.lock();
        state.is_active = is_active;
        debug!(
            "event=window_state module=service status=ok is_active={}",
            is_active
        );
        *state
    }
}

impl<S: DurableStore + 'static> Drop for AppService<S> {
    fn drop(&mut self) {
        // Dropping the scheduler signals its worker without blocking exit.
        self.scheduler.take();
    }
}
