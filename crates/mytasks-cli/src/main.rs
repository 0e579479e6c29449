//! MyTasks CLI - Command-line interface for the mytasks project and task tracker.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use mytasks_core::agenda::{
    Agenda, AgendaRequest, AgendaTab, CompletedRange, UpcomingWindow,
    DEFAULT_COMPLETED_LOOKBACK_DAYS,
};
use mytasks_core::{Priority, Project, ProjectType, Task};
use mytasks_storage::config::{DEFAULT_DB_PATH, DB_PATH_ENV};
use mytasks_storage::{load_agenda, OpContext, SqliteStore, Store, StoreConfig};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mytasks")]
#[command(about = "MyTasks - Projects and tasks in one local database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file
    #[arg(long, global = true, env = DB_PATH_ENV, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Give up on a storage call after this many milliseconds
    #[arg(long, global = true, env = "MYTASKS_TIMEOUT_MS", default_value_t = 5000)]
    timeout_ms: u64,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects and categories
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage tasks within a project
    #[command(subcommand)]
    Task(TaskCommand),

    /// Show an agenda: active, completed or upcoming
    Agenda {
        /// Tab name; anything else shows the active tab
        #[arg(default_value = "active")]
        tab: String,

        /// Upcoming window length: 7, 14 or 30
        #[arg(short, long, default_value_t = 30)]
        days: u32,

        /// First completion day for the completed tab (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last completion day for the completed tab (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// List applied schema migrations
    Migrations,
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Create a project
    Add {
        /// Project name
        name: String,

        /// Create an open-ended category instead
        #[arg(long)]
        category: bool,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Target date (YYYY-MM-DD); projects only
        #[arg(short, long)]
        target: Option<NaiveDate>,
    },

    /// List projects in display order
    List,

    /// Show a project and its tasks
    Show {
        /// Project ID
        id: i64,
    },

    /// Edit a project
    Edit {
        /// Project ID
        id: i64,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New target date (YYYY-MM-DD)
        #[arg(short, long, conflicts_with = "clear_target")]
        target: Option<NaiveDate>,

        /// Remove the target date
        #[arg(long)]
        clear_target: bool,
    },

    /// Mark a project complete
    Complete {
        /// Project ID
        id: i64,
    },

    /// Mark a project incomplete
    Reopen {
        /// Project ID
        id: i64,
    },

    /// Delete a project and all of its tasks
    Delete {
        /// Project ID
        id: i64,
    },

    /// Set display order; IDs in their new order
    Reorder {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Create a task
    Add {
        /// Owning project ID
        project_id: i64,

        /// Task description
        description: String,

        /// Priority: high, medium or low
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,

        /// Free-form notes (255 characters max)
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List tasks of a project
    List {
        /// Project ID
        project_id: i64,

        /// Only open tasks
        #[arg(long, conflicts_with = "done")]
        open: bool,

        /// Only completed tasks
        #[arg(long)]
        done: bool,

        /// Maximum number of tasks (0 = all)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// List tasks completed within a date range, newest first
    Completed {
        /// Project ID
        project_id: i64,

        /// First day (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Maximum number of tasks (0 = all)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Show task details
    Show {
        /// Task ID
        id: i64,
    },

    /// Edit a task
    Edit {
        /// Task ID
        id: i64,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New priority
        #[arg(short, long)]
        priority: Option<String>,

        /// New due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// New notes
        #[arg(short, long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        /// Remove the notes
        #[arg(long)]
        clear_notes: bool,
    },

    /// Flip a task between open and completed
    Toggle {
        /// Task ID
        id: i64,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: i64,
    },

    /// Set display order within a project; IDs in their new order
    Reorder {
        /// Project ID
        project_id: i64,

        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    debug!(db = %cli.db.display(), "MyTasks CLI starting");

    let store = SqliteStore::open(StoreConfig::new(&cli.db))
        .await
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;
    let cx = OpContext::with_timeout(Duration::from_millis(cli.timeout_ms));
    let out = Output { json: cli.json };

    let result = match cli.command {
        Commands::Project(cmd) => run_project(&store, &cx, &out, cmd).await,
        Commands::Task(cmd) => run_task(&store, &cx, &out, cmd).await,
        Commands::Agenda {
            tab,
            days,
            from,
            to,
        } => run_agenda(&store, &cx, &out, AgendaTab::parse(&tab), days, from, to).await,
        Commands::Migrations => {
            let applied = store.applied_migrations(&cx).await?;
            if out.json {
                out.print_json(&applied)
            } else {
                println!("{:<8} {:<32} {}", "VERSION".bold(), "NAME".bold(), "APPLIED".bold());
                println!("{}", "─".repeat(72));
                for m in &applied {
                    println!("{:<8} {:<32} {}", m.version, m.name, m.applied_at);
                }
                Ok(())
            }
        }
    };

    store.close().await?;
    result
}

async fn run_project(
    store: &SqliteStore,
    cx: &OpContext,
    out: &Output,
    cmd: ProjectCommand,
) -> Result<()> {
    match cmd {
        ProjectCommand::Add {
            name,
            category,
            description,
            target,
        } => {
            let kind = if category {
                ProjectType::Category
            } else {
                ProjectType::Project
            };
            let mut project = Project::new(name, kind);
            project.description = description;
            project.target_date = target;
            project.validate()?;

            let created = store.create_project(cx, &project).await?;
            out.done(&format!("✓ Created {} {}", created.project_type, created.id), &created)
        }

        ProjectCommand::List => {
            let projects = store.list_projects(cx).await?;
            if out.json {
                return out.print_json(&projects);
            }
            if projects.is_empty() {
                println!("{}", "No projects found".yellow());
                return Ok(());
            }

            println!(
                "{:<6} {:<10} {:<12} {:<10} {}",
                "ID".bold(),
                "TYPE".bold(),
                "TARGET".bold(),
                "STATUS".bold(),
                "NAME".bold()
            );
            println!("{}", "─".repeat(72));
            let today = mytasks_core::today();
            for project in &projects {
                print_project_row(project, today);
            }
            Ok(())
        }

        ProjectCommand::Show { id } => {
            let project = store.get_project(cx, id).await?;
            let tasks = store.list_tasks_by_project(cx, id, 0).await?;
            if out.json {
                return out.print_json(&mytasks_core::agenda::ProjectTasks { project, tasks });
            }

            let today = mytasks_core::today();
            println!("{}", "━".repeat(72));
            println!("{} {}", "Project:".bold(), project.id.to_string().bright_cyan());
            println!("{}", "━".repeat(72));
            println!("{:<15} {}", "Name:".bold(), project.name);
            println!("{:<15} {}", "Type:".bold(), project.project_type);
            if !project.description.is_empty() {
                println!("{:<15} {}", "Description:".bold(), project.description);
            }
            if let Some(target) = project.target_date {
                let target = target.to_string();
                let target = if project.is_overdue(today) && !project.completed {
                    target.red()
                } else {
                    target.normal()
                };
                println!("{:<15} {}", "Target:".bold(), target);
            }
            println!("{:<15} {}", "Status:".bold(), project_status(&project));
            println!();

            if tasks.is_empty() {
                println!("{}", "No tasks".yellow());
            } else {
                print_task_header();
                for task in &tasks {
                    print_task_row(task, today);
                }
            }
            Ok(())
        }

        ProjectCommand::Edit {
            id,
            name,
            description,
            target,
            clear_target,
        } => {
            let mut project = store.get_project(cx, id).await?;
            if name.is_none() && description.is_none() && target.is_none() && !clear_target {
                println!("{}", "No changes specified".yellow());
                return Ok(());
            }

            if let Some(name) = name {
                project.name = name;
            }
            if let Some(description) = description {
                project.description = description;
            }
            if clear_target {
                project.target_date = None;
            } else if target.is_some() {
                project.target_date = target;
            }
            project.validate()?;

            let updated = store.update_project(cx, &project).await?;
            out.done(&format!("✓ Updated project {}", id), &updated)
        }

        ProjectCommand::Complete { id } => {
            store.mark_project_complete(cx, id).await?;
            let project = store.get_project(cx, id).await?;
            out.done(&format!("✓ Completed project {}", id), &project)
        }

        ProjectCommand::Reopen { id } => {
            store.mark_project_incomplete(cx, id).await?;
            let project = store.get_project(cx, id).await?;
            out.done(&format!("✓ Reopened project {}", id), &project)
        }

        ProjectCommand::Delete { id } => {
            store.delete_project(cx, id).await?;
            out.done(&format!("✓ Deleted project {}", id), &id)
        }

        ProjectCommand::Reorder { ids } => {
            store.reorder_projects(cx, &ids).await?;
            out.done(&format!("✓ Reordered {} projects", ids.len()), &ids)
        }
    }
}

async fn run_task(store: &SqliteStore, cx: &OpContext, out: &Output, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::Add {
            project_id,
            description,
            priority,
            due,
            notes,
        } => {
            let mut task = Task::new(project_id, description, priority.parse::<Priority>()?);
            task.due_date = due;
            task.notes = notes;
            task.validate()?;

            let created = store.create_task(cx, &task).await?;
            out.done(&format!("✓ Created task {}", created.id), &created)
        }

        TaskCommand::List {
            project_id,
            open,
            done,
            limit,
        } => {
            let tasks = if open || done {
                store
                    .list_tasks_by_project_filtered(cx, project_id, done, limit)
                    .await?
            } else {
                store.list_tasks_by_project(cx, project_id, limit).await?
            };
            out.task_table(&tasks)
        }

        TaskCommand::Completed {
            project_id,
            from,
            to,
            limit,
        } => {
            if let (Some(from), Some(to)) = (from, to) {
                CompletedRange::new(from, to)?;
            }
            let tasks = store
                .list_tasks_completed_between(cx, project_id, from, to, limit)
                .await?;
            out.task_table(&tasks)
        }

        TaskCommand::Show { id } => {
            let task = store.get_task(cx, id).await?;
            if out.json {
                return out.print_json(&task);
            }

            let today = mytasks_core::today();
            println!("{}", "━".repeat(72));
            println!("{} {}", "Task:".bold(), task.id.to_string().bright_cyan());
            println!("{}", "━".repeat(72));
            println!("{:<15} {}", "Description:".bold(), task.description);
            println!("{:<15} {}", "Project:".bold(), task.project_id);
            println!("{:<15} {}", "Priority:".bold(), priority_colored(&task.priority));
            println!("{:<15} {}", "Status:".bold(), task_status(&task));
            if let Some(due) = task.due_date {
                println!("{:<15} {}", "Due:".bold(), due_colored(&task, due, today));
            }
            if let Some(done) = task.completed_at {
                println!("{:<15} {}", "Completed:".bold(), done);
            }
            println!("{:<15} {}", "Created:".bold(), task.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("{:<15} {}", "Updated:".bold(), task.updated_at.format("%Y-%m-%d %H:%M:%S"));
            if let Some(notes) = &task.notes {
                println!();
                println!("{}", "Notes:".bold());
                println!("{}", notes);
            }
            Ok(())
        }

        TaskCommand::Edit {
            id,
            description,
            priority,
            due,
            clear_due,
            notes,
            clear_notes,
        } => {
            let mut task = store.get_task(cx, id).await?;
            if description.is_none()
                && priority.is_none()
                && due.is_none()
                && !clear_due
                && notes.is_none()
                && !clear_notes
            {
                println!("{}", "No changes specified".yellow());
                return Ok(());
            }

            if let Some(description) = description {
                task.description = description;
            }
            if let Some(priority) = priority {
                task.priority = priority.parse::<Priority>()?.as_str().to_string();
            }
            if clear_due {
                task.due_date = None;
            } else if due.is_some() {
                task.due_date = due;
            }
            if clear_notes {
                task.notes = None;
            } else if notes.is_some() {
                task.notes = notes;
            }
            task.validate()?;

            let updated = store.update_task(cx, &task).await?;
            out.done(&format!("✓ Updated task {}", id), &updated)
        }

        TaskCommand::Toggle { id } => {
            let task = store.toggle_task_complete(cx, id).await?;
            let verb = if task.completed { "Completed" } else { "Reopened" };
            out.done(&format!("✓ {} task {}", verb, id), &task)
        }

        TaskCommand::Delete { id } => {
            store.delete_task(cx, id).await?;
            out.done(&format!("✓ Deleted task {}", id), &id)
        }

        TaskCommand::Reorder { project_id, ids } => {
            store.reorder_tasks(cx, project_id, &ids).await?;
            out.done(&format!("✓ Reordered {} tasks", ids.len()), &ids)
        }
    }
}

async fn run_agenda(
    store: &SqliteStore,
    cx: &OpContext,
    out: &Output,
    tab: AgendaTab,
    days: u32,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let today = mytasks_core::today();
    let request = match tab {
        AgendaTab::Active => AgendaRequest::Active,
        AgendaTab::Completed => {
            let end = to.unwrap_or(today);
            let start = from.unwrap_or_else(|| {
                CompletedRange::last_days(end, DEFAULT_COMPLETED_LOOKBACK_DAYS).start
            });
            AgendaRequest::Completed(CompletedRange::new(start, end)?)
        }
        AgendaTab::Upcoming => AgendaRequest::Upcoming(UpcomingWindow::new(days)?),
    };

    let agenda = load_agenda(store, cx, request, today).await?;
    if out.json {
        return out.print_json(&agenda);
    }

    match agenda {
        Agenda::Active { projects } => {
            if projects.is_empty() {
                println!("{}", "No open projects".yellow());
            }
            for group in &projects {
                println!("{} {}", group.project.name.bold(), format!("#{}", group.project.id).bright_black());
                if group.tasks.is_empty() {
                    println!("  {}", "nothing open".bright_black());
                }
                for task in &group.tasks {
                    println!(
                        "  {:<6} {:<8} {}",
                        task.id.to_string().bright_cyan(),
                        priority_colored(&task.priority),
                        task.description
                    );
                }
            }
        }
        Agenda::Completed { range, projects } => {
            println!("{}", format!("Completed {} to {}", range.start, range.end).bold());
            if projects.is_empty() {
                println!("{}", "Nothing completed in this range".yellow());
            }
            for group in &projects {
                println!("{}", group.project.name.bold());
                for task in &group.tasks {
                    let done = task.completed_at.map(|d| d.to_string()).unwrap_or_default();
                    println!("  {:<12} {}", done.green(), task.description);
                }
            }
        }
        Agenda::Upcoming { window, tasks } => {
            println!("{}", format!("Due within {} days", window.days()).bold());
            if tasks.is_empty() {
                println!("{}", "Nothing due".yellow());
            }
            for item in &tasks {
                let due = item.task.due_date.map(|d| d.to_string()).unwrap_or_default();
                let due = if item.overdue { due.red().bold() } else { due.normal() };
                println!(
                    "  {:<12} {:<8} {} {}",
                    due,
                    priority_colored(&item.task.priority),
                    item.task.description,
                    format!("({})", item.project_name).bright_black()
                );
            }
        }
    }
    Ok(())
}

/// Chooses between human-readable and JSON output.
struct Output {
    json: bool,
}

impl Output {
    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Confirms a write: the message for humans, the value for scripts.
    fn done<T: Serialize>(&self, message: &str, value: &T) -> Result<()> {
        if self.json {
            self.print_json(value)
        } else {
            println!("{}", message.green().bold());
            Ok(())
        }
    }

    fn task_table(&self, tasks: &[Task]) -> Result<()> {
        if self.json {
            return self.print_json(&tasks);
        }
        if tasks.is_empty() {
            println!("{}", "No tasks found".yellow());
            return Ok(());
        }

        print_task_header();
        let today = mytasks_core::today();
        for task in tasks {
            print_task_row(task, today);
        }
        Ok(())
    }
}

fn print_project_row(project: &Project, today: NaiveDate) {
    let target = project
        .target_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let target = if project.is_overdue(today) && !project.completed {
        target.red()
    } else {
        target.normal()
    };

    println!(
        "{:<6} {:<10} {:<12} {:<10} {}",
        project.id.to_string().bright_cyan(),
        project.project_type,
        target,
        project_status(project),
        project.name
    );
}

fn print_task_header() {
    println!(
        "{:<6} {:<8} {:<12} {:<6} {}",
        "ID".bold(),
        "PRIORITY".bold(),
        "DUE".bold(),
        "DONE".bold(),
        "DESCRIPTION".bold()
    );
    println!("{}", "─".repeat(72));
}

fn print_task_row(task: &Task, today: NaiveDate) {
    let due = match task.due_date {
        Some(due) => due_colored(task, due, today),
        None => "-".normal(),
    };
    let done = if task.completed { "✓".green() } else { " ".normal() };

    println!(
        "{:<6} {:<8} {:<12} {:<6} {}",
        task.id.to_string().bright_cyan(),
        priority_colored(&task.priority),
        due,
        done,
        task.description
    );
}

fn priority_colored(priority: &str) -> ColoredString {
    match priority {
        "high" => priority.red().bold(),
        "medium" => priority.yellow(),
        "low" => priority.normal(),
        _ => priority.bright_black(),
    }
}

fn due_colored(task: &Task, due: NaiveDate, today: NaiveDate) -> ColoredString {
    if task.is_overdue(today) {
        due.to_string().red()
    } else {
        due.to_string().normal()
    }
}

fn project_status(project: &Project) -> ColoredString {
    match (project.completed, project.completed_at) {
        (true, Some(at)) => format!("done {}", at).bright_black(),
        (true, None) => "done".bright_black(),
        (false, _) => "open".green(),
    }
}

fn task_status(task: &Task) -> ColoredString {
    if task.completed {
        "completed".bright_black()
    } else {
        "open".green()
    }
}
