//! SQLite-file implementation of the durable store.
//!
//! # Responsibility
//! - Serialize a whole `StoreState` into one SQLite file.
//! - Replace the live file atomically via write-to-temp + rename.
//! - Maintain a separate backup file with the same shape.
//!
//! # Invariants
//! - Live and backup files are only opened read-only; only complete temp
//!   files are renamed over them.
//! - A file without a task store schema is corrupt, never an empty store.
//! - A failed write removes its temp file before the error is returned.
//! - Task text never appears in log events.

use super::{now_epoch_ms, DurableStore, StoreError, StoreResult, StoreState};
use crate::db::{open_db, open_db_read_only, DbError};
use crate::model::task::{Settings, Task};
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, Row};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Primary store file name inside the data directory.
pub const STORE_FILE_NAME: &str = "tasks.db";
/// Backup file name inside the data directory.
pub const BACKUP_FILE_NAME: &str = "tasks.backup.db";

/// Durable store backed by whole-file SQLite snapshots.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    backup_path: PathBuf,
}

impl SqliteStore {
    /// Creates a store with explicit primary and backup locations.
    pub fn new(path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_path: backup_path.into(),
        }
    }

    /// Creates a store using the default file names under `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self::new(
            data_dir.join(STORE_FILE_NAME),
            data_dir.join(BACKUP_FILE_NAME),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    fn read_file(&self, path: &Path) -> StoreResult<StoreState> {
        let conn = open_db_read_only(path).map_err(StoreError::from_read)?;
        read_state(&conn)
    }

    fn write_file(&self, target: &Path, state: &StoreState, kind: &str) -> StoreResult<i64> {
        let started_at = Instant::now();
        let stamp = now_epoch_ms();
        let tmp = temp_path_for(target);

        if let Err(err) = write_temp(&tmp, state, stamp) {
            discard_temp(&tmp);
            error!(
                "event=store_write module=store status=error kind={} stage=write duration_ms={} error={}",
                kind,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp, target) {
            discard_temp(&tmp);
            error!(
                "event=store_write module=store status=error kind={} stage=rename duration_ms={} error={}",
                kind,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(StoreError::io(target, err));
        }

        debug!(
            "event=store_write module=store status=ok kind={} tasks={} duration_ms={}",
            kind,
            state.tasks.len(),
            started_at.elapsed().as_millis()
        );
        Ok(stamp)
    }
}

impl DurableStore for SqliteStore {
    fn load(&self) -> StoreResult<StoreState> {
        if !self.path.exists() {
            info!("event=store_load module=store status=ok source=default reason=missing_file");
            return Ok(StoreState::default());
        }
        let state = self.read_file(&self.path)?;
        info!(
            "event=store_load module=store status=ok source=primary tasks={}",
            state.tasks.len()
        );
        Ok(state)
    }

    fn save(&self, state: &StoreState) -> StoreResult<i64> {
        self.write_file(&self.path, state, "primary")
    }

    fn backup(&self, state: &StoreState) -> StoreResult<i64> {
        self.write_file(&self.backup_path, state, "backup")
    }

    fn restore_from_backup(&self) -> StoreResult<StoreState> {
        if !self.backup_path.exists() {
            return Err(StoreError::BackupMissing(self.backup_path.clone()));
        }
        let state = self.read_file(&self.backup_path)?;
        info!(
            "event=store_load module=store status=ok source=backup tasks={}",
            state.tasks.len()
        );
        Ok(state)
    }

    fn last_backup_at(&self) -> StoreResult<Option<i64>> {
        if !self.backup_path.exists() {
            return Ok(None);
        }
        let conn = open_db_read_only(&self.backup_path).map_err(StoreError::from_read)?;
        let stamp: Option<i64> = conn
            .query_row(
                "SELECT last_modified FROM store_meta WHERE id = 1;",
                [],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::from_read(err.into()))?;
        Ok(stamp)
    }
}

/// Writes `state` into a migrated connection, replacing existing rows.
pub fn write_state(conn: &mut Connection, state: &StoreState, stamp: i64) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM tasks;", [])?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO tasks (
                id,
                text,
                completed,
                parent_id,
                level,
                is_expanded,
                sort_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        )?;
        for task in state.tasks.values() {
            insert.execute(params![
                task.id,
                task.text.as_str(),
                task.completed,
                task.parent_id,
                task.level,
                task.is_expanded,
                task.sort_order,
            ])?;
        }
    }
    tx.execute(
        "UPDATE store_meta SET next_id = ?1, last_modified = ?2 WHERE id = 1;",
        params![state.next_id, stamp],
    )?;
    tx.execute(
        "UPDATE settings SET always_on_top = ?1 WHERE id = 1;",
        params![state.settings.always_on_top],
    )?;
    tx.commit()?;
    Ok(())
}

/// Reads a complete `StoreState` from a migrated connection.
pub fn read_state(conn: &Connection) -> StoreResult<StoreState> {
    let mut state = StoreState::default();

    let mut stmt = conn
        .prepare(
            "SELECT
                id,
                text,
                completed,
                parent_id,
                level,
                is_expanded,
                sort_order
             FROM tasks
             ORDER BY id ASC;",
        )
        .map_err(read_err)?;
    let mut rows = stmt.query([]).map_err(read_err)?;
    while let Some(row) = rows.next().map_err(read_err)? {
        let task = parse_task_row(row)?;
        state.tasks.insert(task.id, task);
    }

    let (next_id, last_modified): (i64, Option<i64>) = conn
        .query_row(
            "SELECT next_id, last_modified FROM store_meta WHERE id = 1;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(read_err)?;
    state.next_id = next_id;
    state.last_modified = last_modified;

    let always_on_top = conn
        .query_row(
            "SELECT always_on_top FROM settings WHERE id = 1;",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map_err(read_err)?;
    state.settings = Settings {
        always_on_top: parse_flag(always_on_top, "settings.always_on_top")?,
    };

    if state.repair_next_id() {
        warn!(
            "event=store_load module=store status=repaired field=next_id next_id={}",
            state.next_id
        );
    }
    Ok(state)
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<Task> {
    let id: i64 = row.get("id").map_err(read_err)?;
    if id <= 0 {
        return Err(StoreError::Corrupt(format!(
            "invalid id `{id}` in tasks.id"
        )));
    }
    let text: String = row.get("text").map_err(read_err)?;
    if text.trim().is_empty() {
        return Err(StoreError::Corrupt(format!("blank text for task {id}")));
    }
    let level: i64 = row.get("level").map_err(read_err)?;
    let level = u32::try_from(level).map_err(|_| {
        StoreError::Corrupt(format!("invalid level `{level}` for task {id}"))
    })?;

    Ok(Task {
        id,
        text,
        completed: parse_flag(row.get("completed").map_err(read_err)?, "tasks.completed")?,
        parent_id: row.get("parent_id").map_err(read_err)?,
        level,
        is_expanded: parse_flag(
            row.get("is_expanded").map_err(read_err)?,
            "tasks.is_expanded",
        )?,
        sort_order: row.get("sort_order").map_err(read_err)?,
    })
}

fn parse_flag(value: i64, column: &'static str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::Corrupt(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn read_err(err: rusqlite::Error) -> StoreError {
    StoreError::from_read(DbError::Sqlite(err))
}

fn write_temp(tmp: &Path, state: &StoreState, stamp: i64) -> StoreResult<()> {
    discard_temp(tmp);
    let mut conn = open_db(tmp)?;
    write_state(&mut conn, state, stamp)?;
    conn.close().map_err(|(_, err)| StoreError::from(err))?;
    Ok(())
}

fn discard_temp(tmp: &Path) {
    for path in [tmp.to_path_buf(), journal_path_for(tmp)] {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                "event=store_cleanup module=store status=error path={} error={}",
                path.display(),
                err
            ),
        }
    }
}

fn temp_path_for(target: &Path) -> PathBuf {
    with_suffix(target, ".tmp")
}

fn journal_path_for(path: &Path) -> PathBuf {
    with_suffix(path, "-journal")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::{read_state, temp_path_for, write_state};
    use crate::db::open_db_in_memory;
    use crate::model::task::Task;
    use crate::store::StoreState;
    use std::path::Path;

    #[test]
    fn temp_path_appends_suffix_to_file_name() {
        let tmp = temp_path_for(Path::new("/data/tasks.db"));
        assert_eq!(tmp, Path::new("/data/tasks.db.tmp"));
    }

    #[test]
    fn write_then_read_preserves_state() {
        let mut conn = open_db_in_memory().unwrap();
        let mut state = StoreState::default();
        let root = Task::new_root(1, "root", 0);
        let mut child = Task::new_child(2, &root, "child", 3);
        child.completed = true;
        child.is_expanded = false;
        state.tasks.insert(root.id, root);
        state.tasks.insert(child.id, child);
        state.next_id = 5;
        state.settings.always_on_top = false;

        write_state(&mut conn, &state, 1_700_000_000_000).unwrap();
        let loaded = read_state(&conn).unwrap();

        state.last_modified = Some(1_700_000_000_000);
        assert_eq!(loaded, state);
    }

    #[test]
    fn read_rejects_invalid_flag_values() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO tasks (id, text, completed, is_expanded) VALUES (1, 'x', 0, 7);",
            [],
        )
        .unwrap();

        let err = read_state(&conn).unwrap_err();
        assert!(err.is_corrupt());
    }
}
