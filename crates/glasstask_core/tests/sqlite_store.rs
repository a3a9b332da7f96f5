use glasstask_core::{DurableStore, SqliteStore, StoreError, StoreState, Task};
use rusqlite::Connection;
use std::fs;
use std::path::Path;

fn sample_state() -> StoreState {
    let mut state = StoreState::default();
    let root = Task::new_root(1, "Plan trip", 0);
    let mut child = Task::new_child(2, &root, "Book hotel", 0);
    child.completed = true;
    let mut collapsed = Task::new_root(4, "Someday", 1);
    collapsed.is_expanded = false;
    for task in [root, child, collapsed] {
        state.tasks.insert(task.id, task);
    }
    state.next_id = 6;
    state.settings.always_on_top = false;
    state
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn load_of_missing_file_returns_default_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());

    assert_eq!(store.load().unwrap(), StoreState::default());
    assert!(!store.path().exists());
}

#[test]
fn save_then_load_is_lossless() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    let mut state = sample_state();

    let stamp = store.save(&state).unwrap();
    let loaded = store.load().unwrap();

    state.last_modified = Some(stamp);
    assert_eq!(loaded, state);
}

#[test]
fn save_replaces_previous_content_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    store.save(&sample_state()).unwrap();

    let mut smaller = StoreState::default();
    smaller
        .tasks
        .insert(9, Task::new_root(9, "only one", 0));
    smaller.next_id = 10;
    store.save(&smaller).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.tasks.len(), 1);
    assert_eq!(loaded.next_id, 10);
    assert!(loaded.settings.always_on_top);
    assert_eq!(dir_entries(dir.path()), vec!["tasks.db".to_string()]);
}

#[test]
fn load_of_garbage_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    fs::write(store.path(), vec![b'x'; 4096]).unwrap();

    let err = store.load().unwrap_err();

    assert!(err.is_corrupt(), "unexpected error: {err}");
}

#[test]
fn load_of_newer_schema_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    let conn = Connection::open(store.path()).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    assert!(store.load().unwrap_err().is_corrupt());
}

#[test]
fn load_of_invalid_rows_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    store.save(&sample_state()).unwrap();
    let conn = Connection::open(store.path()).unwrap();
    conn.execute("UPDATE tasks SET level = -3 WHERE id = 2;", [])
        .unwrap();
    drop(conn);

    assert!(store.load().unwrap_err().is_corrupt());
}

#[test]
fn load_repairs_id_counter_behind_stored_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    store.save(&sample_state()).unwrap();
    let conn = Connection::open(store.path()).unwrap();
    conn.execute("UPDATE store_meta SET next_id = 2 WHERE id = 1;", [])
        .unwrap();
    drop(conn);

    assert_eq!(store.load().unwrap().next_id, 5);
}

#[test]
fn failed_rename_surfaces_error_and_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    fs::create_dir(store.path()).unwrap();
    fs::write(store.path().join("occupied"), b"x").unwrap();

    let err = store.save(&sample_state()).unwrap_err();

    assert!(matches!(err, StoreError::Io { .. }), "unexpected error: {err}");
    assert_eq!(dir_entries(dir.path()), vec!["tasks.db".to_string()]);
    assert!(store.path().is_dir());
}

#[test]
fn save_into_missing_directory_fails_without_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path().join("missing"));

    assert!(store.save(&sample_state()).is_err());
    assert!(!dir.path().join("missing").exists());
}

#[test]
fn backup_is_separate_from_primary() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    assert_eq!(store.last_backup_at().unwrap(), None);
    assert!(matches!(
        store.restore_from_backup(),
        Err(StoreError::BackupMissing(_))
    ));

    let stamp = store.backup(&sample_state()).unwrap();

    assert!(!store.path().exists());
    assert_eq!(store.last_backup_at().unwrap(), Some(stamp));
    let restored = store.restore_from_backup().unwrap();
    assert_eq!(restored.tasks, sample_state().tasks);
    assert_eq!(restored.next_id, 6);
    assert_eq!(
        dir_entries(dir.path()),
        vec!["tasks.backup.db".to_string()]
    );
}

#[test]
fn load_of_zero_byte_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    store.save(&sample_state()).unwrap();
    fs::write(store.path(), b"").unwrap();

    let err = store.load().unwrap_err();

    assert!(err.is_corrupt(), "unexpected error: {err}");
    assert_eq!(fs::metadata(store.path()).unwrap().len(), 0);
}

#[test]
fn load_of_foreign_sqlite_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    let conn = Connection::open(store.path()).unwrap();
    conn.execute_batch("CREATE TABLE notes (body TEXT);").unwrap();
    drop(conn);

    assert!(store.load().unwrap_err().is_corrupt());
}

#[test]
fn load_leaves_primary_file_byte_for_byte_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    store.save(&sample_state()).unwrap();
    let before = fs::read(store.path()).unwrap();

    store.load().unwrap();
    store.backup(&sample_state()).unwrap();
    store.last_backup_at().unwrap();
    store.restore_from_backup().unwrap();

    assert_eq!(fs::read(store.path()).unwrap(), before);
    assert_eq!(
        dir_entries(dir.path()),
        vec!["tasks.backup.db".to_string(), "tasks.db".to_string()]
    );
}

#[test]
fn legacy_flat_store_loads_without_rewriting_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::in_dir(dir.path());
    let conn = Connection::open(store.path()).unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1))
        );
        INSERT INTO tasks (id, text, completed) VALUES (2, 'water plants', 1);
        PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);
    let before = fs::read(store.path()).unwrap();

    let state = store.load().unwrap();

    assert_eq!(state.next_id, 3);
    assert_eq!(state.tasks[&2].level, 0);
    assert!(state.tasks[&2].is_expanded);
    assert!(state.settings.always_on_top);
    assert_eq!(fs::read(store.path()).unwrap(), before);
}
