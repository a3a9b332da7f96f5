//! Periodic background backup.
//!
//! # Responsibility
//! - Snapshot the repository to its backup location on a fixed interval.
//! - Accept on-demand backup requests without blocking the caller.
//!
//! # Invariants
//! - Backup failures are logged and never stop the schedule.
//! - Scheduled backups keep a fixed cadence; manual triggers do not shift it.
//! - The worker only takes the repository's shared lock, via `force_backup`.
//! - Dropping the scheduler signals the worker to stop without joining it.

use crate::repo::task_repo::TaskRepository;
use crate::store::DurableStore;
use log::{info, warn};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default interval between scheduled backups.
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

const WORKER_THREAD_NAME: &str = "glasstask-backup";

enum Command {
    BackupNow,
}

/// Handle to the background backup worker.
pub struct BackupScheduler {
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    interval: Duration,
}

impl BackupScheduler {
    /// Spawns the worker thread.
    ///
    /// # Errors
    /// - Returns the OS error when the thread cannot be spawned.
    pub fn start<S>(repo: Arc<TaskRepository<S>>, interval: Duration) -> io::Result<Self>
    where
        S: DurableStore + 'static,
    {
        let (commands, inbox) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                info!(
                    "event=backup_scheduler module=service status=start interval_secs={}",
                    interval.as_secs()
                );
                let mut deadline = Instant::now() + interval;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    let trigger = match inbox.recv_timeout(wait) {
                        Ok(Command::BackupNow) => "manual",
                        Err(RecvTimeoutError::Timeout) => {
                            deadline = next_deadline(deadline, interval, Instant::now());
                            "scheduled"
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    };
                    if let Err(err) = repo.force_backup() {
                        warn!(
                            "event=backup_tick module=service status=error trigger={} error={}",
                            trigger, err
                        );
                    }
                }
                info!("event=backup_scheduler module=service status=stopped");
            })?;

        Ok(Self {
            commands: Some(commands),
            worker: Some(worker),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Asks the worker to back up as soon as it is idle.
    ///
    /// Returns `false` when the worker is no longer running.
    pub fn trigger(&self) -> bool {
        self.commands
            .as_ref()
            .is_some_and(|commands| commands.send(Command::BackupNow).is_ok())
    }

    /// Stops the worker and waits for an in-flight backup to finish.
    pub fn shutdown(mut self) {
        self.commands.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("event=backup_scheduler module=service status=error reason=worker_panicked");
            }
        }
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        // Closing the channel wakes the worker, which then exits on its own.
        self.commands.take();
    }
}

/// Next scheduled tick after `deadline` fired at `now`.
///
/// Ticks missed while a backup ran are skipped rather than replayed.
fn next_deadline(deadline: Instant, interval: Duration, now: Instant) -> Instant {
    let next = deadline + interval;
    if next <= now {
        now + interval
    } else {
        next
    }
}
