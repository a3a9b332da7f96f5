use glasstask_core::db::migrations::{current_user_version, latest_version};
use glasstask_core::db::{open_db, open_db_in_memory, open_db_read_only, DbError};
use glasstask_core::store::read_state;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "tasks");
    assert_table_exists(&conn, "store_meta");
    assert_table_exists(&conn, "settings");
}

#[test]
fn fresh_store_has_default_meta_and_settings() {
    let conn = open_db_in_memory().unwrap();

    let state = read_state(&conn).unwrap();

    assert!(state.tasks.is_empty());
    assert_eq!(state.next_id, 1);
    assert_eq!(state.last_modified, None);
    assert!(state.settings.always_on_top);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "tasks");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn flat_v1_store_gains_hierarchy_columns_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1))
        );
        INSERT INTO tasks (id, text, completed) VALUES (3, 'water plants', 1);
        INSERT INTO tasks (id, text, completed) VALUES (7, 'call mom', 0);
        PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    let state = read_state(&conn).unwrap();

    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    assert_eq!(state.tasks.len(), 2);
    assert_eq!(state.next_id, 8);
    let task = &state.tasks[&3];
    assert_eq!(task.parent_id, None);
    assert_eq!(task.level, 0);
    assert!(task.is_expanded);
    assert!(task.completed);
    assert_eq!(task.sort_order, 0);
}

#[test]
fn read_only_open_migrates_legacy_file_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0
        );
        PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);

    let migrated = open_db_read_only(&path).unwrap();
    assert_eq!(current_user_version(&migrated).unwrap(), latest_version());
    assert_table_exists(&migrated, "store_meta");
    drop(migrated);

    let on_disk = Connection::open(&path).unwrap();
    assert_eq!(current_user_version(&on_disk).unwrap(), 1);
}

#[test]
fn read_only_open_rejects_files_without_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.db");
    std::fs::write(&path, b"").unwrap();

    let err = open_db_read_only(&path).unwrap_err();

    assert!(matches!(err, DbError::MissingSchema));
    assert!(err.is_corruption());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
