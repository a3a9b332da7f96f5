//! `glasstask` command-line driver for the task store.
//!
//! # Responsibility
//! - Map subcommands onto repository and app-service operations.
//! - Render results as indented text or JSON.

mod output;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glasstask_core::{
    core_version, init_logging, AppService, CoreConfig, NoopWindowChrome, SqliteStore, Task,
    TaskId,
};
use log::info;
use output::{render, write_forest, write_integrity, write_stats, write_task_line, OutputMode};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "glasstask: hierarchical to-do list", long_about = None)]
struct Cli {
    /// Data directory holding tasks.db, the backup and logs.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the task tree.
    List,
    /// Add a root task.
    Add { text: String },
    /// Add a subtask under PARENT.
    Sub { parent: TaskId, text: String },
    /// Toggle completion of a task.
    Done { id: TaskId },
    /// Replace the text of a task.
    Edit { id: TaskId, text: String },
    /// Move a task under another parent, or to the root with no --parent.
    Mv {
        id: TaskId,
        #[arg(long)]
        parent: Option<TaskId>,
    },
    /// Expand or collapse a task.
    Toggle { id: TaskId },
    /// Delete a task and all of its subtasks.
    Rm { id: TaskId },
    /// Set sibling order; ids are listed in their new order.
    Reorder {
        /// Parent of the siblings; omit for root tasks.
        #[arg(long)]
        parent: Option<TaskId>,
        #[arg(required = true)]
        ids: Vec<TaskId>,
    },
    /// Write a backup now.
    Backup,
    /// Replace the task list with the last backup.
    Restore,
    /// Show completion counters.
    Stats,
    /// Check hierarchy integrity.
    Check,
    /// Toggle the always-on-top window setting.
    Pin,
    /// Show store location, settings and last backup.
    Status,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    version: &'static str,
    data_dir: PathBuf,
    tasks: usize,
    always_on_top: bool,
    last_backup: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mode = cli.output_mode();

    let mut config = CoreConfig::from_env().context("failed to resolve configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config.data_dir = std::path::absolute(&config.data_dir)
        .with_context(|| format!("invalid data directory `{}`", config.data_dir.display()))?;

    // Log setup failure leaves the CLI usable.
    if let Err(err) = init_logging(&config.log_level, config.log_dir()) {
        eprintln!("warning: logging disabled: {err}");
    }
    info!("event=cli_command module=cli status=start command={:?}", cli.command);

    let app = AppService::open(&config, Box::new(NoopWindowChrome))
        .context("failed to open task store")?;

    run(&app, &config, cli.command, mode)
}

fn run(
    app: &AppService<SqliteStore>,
    config: &CoreConfig,
    command: Commands,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let repo = app.repo();
    match command {
        Commands::List => render(mode, &repo.list_root_tasks(), |forest, w| {
            write_forest(forest, w)
        }),
        Commands::Add { text } => {
            let task = repo.add_task(&text).context("failed to add task")?;
            render(mode, &task, write_task_line)
        }
        Commands::Sub { parent, text } => {
            let task = repo
                .add_sub_task(parent, &text)
                .context("failed to add subtask")?;
            render(mode, &task, write_task_line)
        }
        Commands::Done { id } => {
            repo.toggle_completed(id)
                .with_context(|| format!("failed to toggle task {id}"))?;
            show_task(repo.get_task(id), id, mode)
        }
        Commands::Edit { id, text } => {
            let mut task = repo
                .get_task(id)
                .with_context(|| format!("task not found: {id}"))?;
            task.text = text;
            repo.update_task(&task)
                .with_context(|| format!("failed to edit task {id}"))?;
            show_task(repo.get_task(id), id, mode)
        }
        Commands::Mv { id, parent } => {
            let mut task = repo
                .get_task(id)
                .with_context(|| format!("task not found: {id}"))?;
            task.parent_id = parent;
            repo.update_task(&task)
                .with_context(|| format!("failed to move task {id}"))?;
            show_task(repo.get_task(id), id, mode)
        }
        Commands::Toggle { id } => {
            repo.toggle_expanded(id)
                .with_context(|| format!("failed to toggle task {id}"))?;
            show_task(repo.get_task(id), id, mode)
        }
        Commands::Rm { id } => {
            let removed = repo
                .delete_task(id)
                .with_context(|| format!("failed to delete task {id}"))?;
            render(mode, &serde_json::json!({ "removed": removed }), |_, w| {
                writeln!(w, "removed {removed} task(s)")
            })
        }
        Commands::Reorder { parent, ids } => {
            repo.reorder_tasks(&ids, parent)
                .context("failed to reorder tasks")?;
            render(mode, &repo.list_root_tasks(), |forest, w| {
                write_forest(forest, w)
            })
        }
        Commands::Backup => {
            app.force_backup().context("backup failed")?;
            let at = app.last_backup_time();
            render(mode, &serde_json::json!({ "lastBackup": at }), |_, w| {
                writeln!(w, "backup written at {at}")
            })
        }
        Commands::Restore => {
            let restored = repo
                .restore_from_backup()
                .context("restore from backup failed")?;
            render(mode, &serde_json::json!({ "restored": restored }), |_, w| {
                writeln!(w, "restored {restored} task(s) from backup")
            })
        }
        Commands::Stats => render(mode, &app.stats(), |stats, w| write_stats(stats, w)),
        Commands::Check => {
            let report = repo.check_integrity();
            render(mode, &report, |report, w| write_integrity(report, w))?;
            if !report.is_valid {
                bail!("integrity check found {} issue(s)", report.issues.len());
            }
            Ok(())
        }
        Commands::Pin => {
            let on_top = app
                .toggle_always_on_top()
                .context("failed to update settings")?;
            render(mode, &serde_json::json!({ "alwaysOnTop": on_top }), |_, w| {
                writeln!(w, "always on top: {}", if on_top { "on" } else { "off" })
            })
        }
        Commands::Status => {
            let status = StatusReport {
                version: core_version(),
                data_dir: config.data_dir.clone(),
                tasks: app.stats().total,
                always_on_top: app.is_always_on_top(),
                last_backup: app.last_backup_time(),
            };
            render(mode, &status, |status, w| {
                writeln!(w, "version:       {}", status.version)?;
                writeln!(w, "data dir:      {}", status.data_dir.display())?;
                writeln!(w, "tasks:         {}", status.tasks)?;
                writeln!(w, "always on top: {}", status.always_on_top)?;
                writeln!(w, "last backup:   {}", status.last_backup)
            })
        }
    }
}

fn show_task(
    task: Option<Task>,
    id: TaskId,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let task = task.with_context(|| format!("task not found: {id}"))?;
    render(mode, &task, write_task_line)
}
