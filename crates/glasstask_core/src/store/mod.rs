//! Durable store contracts.
//!
//! # Responsibility
//! - Define the persisted unit (`StoreState`) and its storage errors.
//! - Define the `DurableStore` seam used by the task repository.
//!
//! # Invariants
//! - `save` and `backup` replace their target wholesale and atomically.
//! - `load` on a missing store yields `StoreState::default()`.
//! - Content that cannot be parsed is reported as `StoreError::Corrupt`.

use crate::db::DbError;
use crate::model::task::{Settings, Task, TaskId};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod sqlite_store;

pub use sqlite_store::{read_state, write_state, SqliteStore, BACKUP_FILE_NAME, STORE_FILE_NAME};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-level failures.
#[derive(Debug)]
pub enum StoreError {
    /// File-system operation failed (create, rename, remove).
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// SQLite transport or bootstrap failure.
    Db(DbError),
    /// Store content was readable but is not a valid task store.
    Corrupt(String),
    /// No backup artifact exists yet.
    BackupMissing(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a database error seen while reading, separating corruption from
    /// transport failures.
    pub(crate) fn from_read(err: DbError) -> Self {
        if err.is_corruption() {
            Self::Corrupt(err.to_string())
        } else {
            Self::Db(err)
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error at `{}`: {source}", path.display()),
            Self::Db(err) => write!(f, "{err}"),
            Self::Corrupt(message) => write!(f, "corrupt task store: {message}"),
            Self::BackupMissing(path) => write!(f, "no backup found at `{}`", path.display()),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::Corrupt(_) => None,
            Self::BackupMissing(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Everything persisted as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreState {
    /// All tasks keyed by id.
    pub tasks: BTreeMap<TaskId, Task>,
    /// Next id to assign; always greater than every id ever assigned.
    pub next_id: TaskId,
    pub settings: Settings,
    /// Epoch ms of the last successful write, `None` before the first save.
    pub last_modified: Option<i64>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 1,
            settings: Settings::default(),
            last_modified: None,
        }
    }
}

impl StoreState {
    /// Returns owned copies of all tasks in id order.
    pub fn task_list(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Raises `next_id` above every stored id.
    ///
    /// Returns `true` when the counter had to move.
    pub fn repair_next_id(&mut self) -> bool {
        let floor = self.tasks.keys().next_back().map_or(1, |max| max + 1);
        if self.next_id < floor {
            self.next_id = floor;
            return true;
        }
        false
    }
}

/// Persistence seam for the task repository.
///
/// Implementations must be usable from the repository lock holder and the
/// backup thread concurrently.
pub trait DurableStore: Send + Sync {
    /// Loads the primary store; a missing store yields the default state.
    fn load(&self) -> StoreResult<StoreState>;
    /// Atomically replaces the primary store. Returns the written timestamp.
    fn save(&self, state: &StoreState) -> StoreResult<i64>;
    /// Atomically replaces the backup artifact. Returns the written timestamp.
    fn backup(&self, state: &StoreState) -> StoreResult<i64>;
    /// Loads the backup artifact.
    fn restore_from_backup(&self) -> StoreResult<StoreState>;
    /// Timestamp of the current backup artifact, if one exists.
    fn last_backup_at(&self) -> StoreResult<Option<i64>>;
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
