//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the store.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - File connections use rollback journaling with full sync, so a committed
//!   store file is self-contained once the connection is closed.
//! - Read-only opens never write to the file; older schemas are migrated in
//!   an in-memory copy.

use super::migrations::{apply_migrations, current_user_version, latest_version};
use super::{DbError, DbResult};
use log::{debug, error};
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const BACKUP_PAGES_PER_STEP: i32 = 256;

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the file when it does not exist.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path.as_ref()))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory)
}

/// Opens an existing database file for reading only.
///
/// A file at the current schema is returned as-is. A file at an older schema
/// is copied into memory and migrated there; the file itself is untouched.
///
/// # Errors
/// - `DbError::MissingSchema` when the file carries no schema version, which
///   includes zero-byte files.
/// - `DbError::UnsupportedSchemaVersion` when the file is newer than this build.
pub fn open_db_read_only(path: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = read_only_connection(path.as_ref());
    match &result {
        Ok(_) => debug!(
            "event=db_open module=db status=ok mode=read_only duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode=read_only duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn read_only_connection(path: &Path) -> DbResult<Connection> {
    let file = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    file.busy_timeout(BUSY_TIMEOUT)?;

    let version = current_user_version(&file)?;
    let latest = latest_version();
    if version == 0 {
        return Err(DbError::MissingSchema);
    }
    if version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: version,
            latest_supported: latest,
        });
    }
    if version == latest {
        return Ok(file);
    }

    let mut memory = Connection::open_in_memory()?;
    {
        let copy = Backup::new(&file, &mut memory)?;
        copy.run_to_completion(BACKUP_PAGES_PER_STEP, Duration::ZERO, None)?;
    }
    apply_migrations(&mut memory)?;
    Ok(memory)
}

fn open_with(
    mode: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, mode) {
        Ok(()) => {
            debug!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, mode: &str) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if mode == "file" {
        conn.pragma_update_and_check(None, "journal_mode", "DELETE", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "FULL")?;
    }
    apply_migrations(conn)?;
    Ok(())
}
