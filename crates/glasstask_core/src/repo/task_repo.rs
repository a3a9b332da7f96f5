//! Task repository: canonical in-memory collection with durable writes.
//!
//! # Responsibility
//! - Own the task collection and settings behind one read/write lock.
//! - Enforce hierarchy invariants on every mutation.
//! - Persist each mutation through a `DurableStore`, reverting on failure.
//!
//! # Invariants
//! - Writers hold the exclusive lock across mutation and persistence, so
//!   readers only observe states that are durable.
//! - After any call returns, the in-memory state equals the last durable one.
//! - Ids come from `next_id` and are never handed out twice.
//! - `level == parent.level + 1` (0 for roots) for every reachable task.
//! - Callers only ever receive owned copies.

use crate::model::task::{
    normalize_task_text, Task, TaskId, TaskNode, TaskStats, TaskValidationError,
};
use crate::store::{DurableStore, StoreError, StoreState};
use crate::tree::builder::{build_forest, sort_forest};
use crate::tree::integrity::{check_integrity, IntegrityReport};
use chrono::{Local, TimeZone};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Returned by `last_backup_time` before any backup exists.
pub const NEVER_BACKED_UP: &str = "never";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from task repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input failed validation; nothing changed.
    Validation(TaskValidationError),
    /// Referenced task does not exist.
    NotFound(TaskId),
    /// Update references a parent that does not exist.
    ParentNotFound(TaskId),
    /// Update would make a task its own ancestor.
    CycleDetected { task_id: TaskId, parent_id: TaskId },
    /// Durable write failed; the in-memory change was reverted.
    Persistence(StoreError),
}

impl RepoError {
    /// Whether the error was caused by caller input rather than storage.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent task not found: {id}"),
            Self::CycleDetected { task_id, parent_id } => write!(
                f,
                "moving task {task_id} under {parent_id} would create a cycle"
            ),
            Self::Persistence(err) => write!(f, "failed to persist tasks: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository over one durable store.
pub struct TaskRepository<S: DurableStore> {
    store: S,
    state: RwLock<StoreState>,
    // Also serializes backup writes, which share one temp path.
    last_backup_at: Mutex<Option<i64>>,
}

impl<S: DurableStore> TaskRepository<S> {
    /// Opens the repository, recovering from load failures.
    ///
    /// Load order: primary store, then backup, then an empty default state.
    /// A state recovered from backup is written back to the primary store.
    pub fn open(store: S) -> Self {
        let state = match store.load() {
            Ok(state) => state,
            Err(load_err) => {
                warn!(
                    "event=repo_open module=repo status=fallback source=backup corrupt={} error={}",
                    load_err.is_corrupt(),
                    load_err
                );
                recover_from_backup(&store)
            }
        };

        let report = check_integrity(&state.task_list());
        if !report.is_valid {
            warn!(
                "event=repo_integrity module=repo status=error issues={} total_tasks={}",
                report.issues.len(),
                report.total_tasks
            );
        }

        let last_backup_at = store.last_backup_at().unwrap_or_else(|err| {
            warn!(
                "event=repo_open module=repo status=error stage=last_backup error={}",
                err
            );
            None
        });

        info!(
            "event=repo_open module=repo status=ok tasks={} next_id={}",
            state.tasks.len(),
            state.next_id
        );
        Self::with_state(store, state, last_backup_at)
    }

    /// Builds a repository around an already loaded state.
    pub fn with_state(store: S, state: StoreState, last_backup_at: Option<i64>) -> Self {
        Self {
            store,
            state: RwLock::new(state),
            last_backup_at: Mutex::new(last_backup_at),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the full hierarchy ordered by `(sort_order, id)` at every level.
    pub fn list_root_tasks(&self) -> Vec<TaskNode> {
        let flat = self.state.read().task_list();
        let mut forest = build_forest(&flat);
        sort_forest(&mut forest);
        forest
    }

    /// Returns a copy of one task.
    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.state.read().tasks.get(&id).cloned()
    }

    /// Returns a copy of the parent of `id`, if `id` exists and is not a root.
    pub fn find_parent(&self, id: TaskId) -> Option<Task> {
        let state = self.state.read();
        let parent_id = state.tasks.get(&id)?.parent_id?;
        state.tasks.get(&parent_id).cloned()
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(self.state.read().tasks.values())
    }

    pub fn check_integrity(&self) -> IntegrityReport {
        check_integrity(&self.state.read().task_list())
    }

    /// Returns a copy of the whole persisted unit.
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    pub fn is_always_on_top(&self) -> bool {
        self.state.read().settings.always_on_top
    }

    /// Creates a root task appended after the current last root.
    pub fn add_task(&self, text: &str) -> RepoResult<Task> {
        let text = normalize_task_text(text)?;
        self.mutate("task_add", |state| {
            let sort_order = next_sort_order(state, None);
            let task = Task::new_root(state.next_id, text, sort_order);
            state.next_id += 1;
            state.tasks.insert(task.id, task.clone());
            Ok(task)
        })
        .inspect(|task| debug!("event=task_add module=repo status=ok task_id={}", task.id))
    }

    /// Creates a child task appended after its last sibling and expands the parent.
    pub fn add_sub_task(&self, parent_id: TaskId, text: &str) -> RepoResult<Task> {
        if self.get_task(parent_id).is_none() {
            return Err(RepoError::NotFound(parent_id));
        }
        let text = normalize_task_text(text)?;
        self.mutate("task_add_sub", |state| {
            let parent = state
                .tasks
                .get_mut(&parent_id)
                .ok_or(RepoError::NotFound(parent_id))?;
            parent.is_expanded = true;
            let parent = parent.clone();

            let sort_order = next_sort_order(state, Some(parent_id));
            let task = Task::new_child(state.next_id, &parent, text, sort_order);
            state.next_id += 1;
            state.tasks.insert(task.id, task.clone());
            Ok(task)
        })
    }

    /// Replaces the stored fields of `task.id`, except `sort_order`.
    ///
    /// `level` is derived from `parent_id` rather than taken from `task`, and
    /// descendants are re-levelled when the parent changes.
    pub fn update_task(&self, task: &Task) -> RepoResult<()> {
        let text = normalize_task_text(&task.text)?;
        self.mutate("task_update", |state| {
            let current = state
                .tasks
                .get(&task.id)
                .ok_or(RepoError::NotFound(task.id))?;
            let parent_changed = current.parent_id != task.parent_id;

            let level = match task.parent_id {
                None => 0,
                Some(parent_id) => {
                    let parent = state
                        .tasks
                        .get(&parent_id)
                        .ok_or(RepoError::ParentNotFound(parent_id))?;
                    if is_ancestor_or_self(state, task.id, parent_id) {
                        return Err(RepoError::CycleDetected {
                            task_id: task.id,
                            parent_id,
                        });
                    }
                    parent.level + 1
                }
            };
            if level != task.level {
                debug!(
                    "event=task_update module=repo status=normalized task_id={} supplied_level={} level={}",
                    task.id, task.level, level
                );
            }

            let stored = state
                .tasks
                .get_mut(&task.id)
                .ok_or(RepoError::NotFound(task.id))?;
            stored.text = text;
            stored.completed = task.completed;
            stored.parent_id = task.parent_id;
            stored.level = level;
            stored.is_expanded = task.is_expanded;

            if parent_changed {
                relevel_descendants(state, task.id);
            }
            Ok(())
        })
    }

    /// Flips `completed`; returns the new value.
    pub fn toggle_completed(&self, id: TaskId) -> RepoResult<bool> {
        self.mutate("task_toggle_completed", |state| {
            let task = state.tasks.get_mut(&id).ok_or(RepoError::NotFound(id))?;
            task.completed = !task.completed;
            Ok(task.completed)
        })
    }

    /// Flips `is_expanded`; returns the new value.
    pub fn toggle_expanded(&self, id: TaskId) -> RepoResult<bool> {
        self.mutate("task_toggle_expanded", |state| {
            let task = state.tasks.get_mut(&id).ok_or(RepoError::NotFound(id))?;
            task.is_expanded = !task.is_expanded;
            Ok(task.is_expanded)
        })
    }

    /// Deletes `id` and all of its descendants; returns how many were removed.
    pub fn delete_task(&self, id: TaskId) -> RepoResult<usize> {
        self.mutate("task_delete", |state| {
            if !state.tasks.contains_key(&id) {
                return Err(RepoError::NotFound(id));
            }
            let doomed = collect_subtree(state, id);
            for doomed_id in &doomed {
                state.tasks.remove(doomed_id);
            }
            Ok(doomed.len())
        })
        .inspect(|removed| {
            debug!(
                "event=task_delete module=repo status=ok task_id={} removed={}",
                id, removed
            )
        })
    }

    /// Assigns `sort_order = index` to each id of the given sibling scope.
    ///
    /// Ids that do not exist or are not children of `parent_id` are skipped.
    pub fn reorder_tasks(
        &self,
        ordered_ids: &[TaskId],
        parent_id: Option<TaskId>,
    ) -> RepoResult<()> {
        self.mutate("task_reorder", |state| {
            let mut skipped = 0usize;
            for (index, id) in ordered_ids.iter().enumerate() {
                match state.tasks.get_mut(id) {
                    Some(task) if task.parent_id == parent_id => task.sort_order = index as i64,
                    _ => skipped += 1,
                }
            }
            if skipped > 0 {
                warn!(
                    "event=task_reorder module=repo status=partial requested={} skipped={}",
                    ordered_ids.len(),
                    skipped
                );
            }
            Ok(())
        })
    }

    /// Flips the always-on-top setting; returns the new value.
    pub fn toggle_always_on_top(&self) -> RepoResult<bool> {
        self.mutate("settings_toggle_on_top", |state| {
            state.settings.always_on_top = !state.settings.always_on_top;
            Ok(state.settings.always_on_top)
        })
    }

    /// Writes the current state to the backup location now.
    ///
    /// Holds the read lock only while cloning the snapshot.
    pub fn force_backup(&self) -> RepoResult<i64> {
        let mut last_backup_at = self.last_backup_at.lock();
        let started_at = Instant::now();
        let snapshot = self.snapshot();
        match self.store.backup(&snapshot) {
            Ok(stamp) => {
                *last_backup_at = Some(stamp);
                info!(
                    "event=backup module=repo status=ok tasks={} duration_ms={}",
                    snapshot.tasks.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(stamp)
            }
            Err(err) => {
                error!(
                    "event=backup module=repo status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(RepoError::Persistence(err))
            }
        }
    }

    /// Replaces the live state with the backup artifact and persists it.
    ///
    /// Returns the number of restored tasks. The id counter never moves
    /// backwards. On failure nothing changes.
    pub fn restore_from_backup(&self) -> RepoResult<usize> {
        let mut state = self.state.write();
        let mut restored = self
            .store
            .restore_from_backup()
            .map_err(RepoError::Persistence)?;
        // Ids handed out after the backup was taken stay retired.
        restored.next_id = restored.next_id.max(state.next_id);
        let stamp = self.store.save(&restored).map_err(|err| {
            error!(
                "event=backup_restore module=repo status=error error={}",
                err
            );
            RepoError::Persistence(err)
        })?;
        restored.last_modified = Some(stamp);
        let count = restored.tasks.len();
        *state = restored;
        info!(
            "event=backup_restore module=repo status=ok tasks={}",
            count
        );
        Ok(count)
    }

    /// Epoch ms of the last successful backup.
    pub fn last_backup_at(&self) -> Option<i64> {
        *self.last_backup_at.lock()
    }

    /// Last backup as local `YYYY-MM-DD HH:MM:SS`, or `"never"`.
    pub fn last_backup_time(&self) -> String {
        self.last_backup_at()
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| NEVER_BACKED_UP.to_string())
    }

    /// Runs `apply` under the write lock and persists the result.
    ///
    /// Any error, from `apply` or from the store, restores the exact previous
    /// state before returning.
    fn mutate<T>(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut StoreState) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let mut state = self.state.write();
        let previous = state.clone();

        let value = match apply(&mut *state) {
            Ok(value) => value,
            Err(err) => {
                *state = previous;
                return Err(err);
            }
        };

        match self.store.save(&state) {
            Ok(stamp) => {
                state.last_modified = Some(stamp);
                info!(
                    "event={} module=repo status=ok tasks={} duration_ms={}",
                    op,
                    state.tasks.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                *state = previous;
                error!(
                    "event={} module=repo status=rolled_back duration_ms={} error={}",
                    op,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(RepoError::Persistence(err))
            }
        }
    }
}

fn recover_from_backup<S: DurableStore>(store: &S) -> StoreState {
    match store.restore_from_backup() {
        Ok(mut state) => {
            match store.save(&state) {
                Ok(stamp) => state.last_modified = Some(stamp),
                Err(err) => warn!(
                    "event=repo_open module=repo status=error stage=rewrite_primary error={}",
                    err
                ),
            }
            info!(
                "event=repo_open module=repo status=ok source=backup tasks={}",
                state.tasks.len()
            );
            state
        }
        Err(err) => {
            error!(
                "event=repo_open module=repo status=fallback source=empty error={}",
                err
            );
            StoreState::default()
        }
    }
}

fn next_sort_order(state: &StoreState, parent_id: Option<TaskId>) -> i64 {
    state
        .tasks
        .values()
        .filter(|task| task.parent_id == parent_id)
        .map(|task| task.sort_order)
        .max()
        .map_or(0, |max| max + 1)
}

fn children_index(state: &StoreState) -> HashMap<TaskId, Vec<TaskId>> {
    let mut children: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    for task in state.tasks.values() {
        if let Some(parent_id) = task.parent_id {
            children.entry(parent_id).or_default().push(task.id);
        }
    }
    children
}

/// Returns `root` and every transitive descendant, via an explicit worklist.
fn collect_subtree(state: &StoreState, root: TaskId) -> Vec<TaskId> {
    let children = children_index(state);
    let mut seen = HashSet::from([root]);
    let mut collected = vec![root];
    let mut worklist = vec![root];
    while let Some(current) = worklist.pop() {
        for child in children.get(&current).into_iter().flatten() {
            if seen.insert(*child) {
                collected.push(*child);
                worklist.push(*child);
            }
        }
    }
    collected
}

/// Whether `candidate` is `task_id` or one of its descendants.
fn is_ancestor_or_self(state: &StoreState, task_id: TaskId, candidate: TaskId) -> bool {
    let mut seen = HashSet::new();
    let mut cursor = Some(candidate);
    while let Some(current) = cursor {
        if current == task_id || !seen.insert(current) {
            return true;
        }
        cursor = state.tasks.get(&current).and_then(|task| task.parent_id);
    }
    false
}

fn relevel_descendants(state: &mut StoreState, root: TaskId) {
    let children = children_index(state);
    let mut worklist = vec![root];
    let mut seen = HashSet::from([root]);
    while let Some(current) = worklist.pop() {
        let Some(level) = state.tasks.get(&current).map(|task| task.level) else {
            continue;
        };
        for child in children.get(&current).into_iter().flatten() {
            if !seen.insert(*child) {
                continue;
            }
            if let Some(task) = state.tasks.get_mut(child) {
                task.level = level + 1;
            }
            worklist.push(*child);
        }
    }
}
