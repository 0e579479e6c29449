//! Turso-backed store.
//!
//! Architecture:
//!   - One connection behind a mutex: a single writer at a time, readers queue
//!   - WAL journal, busy timeout and foreign keys set at open (see `StoreConfig`)
//!   - Schema migrated before the store is handed out
//!   - Dates stored as `YYYY-MM-DD`, timestamps as RFC 3339

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mytasks_core::{Project, Task};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use turso::{params, Builder, Connection};

use crate::config::StoreConfig;
use crate::context::OpContext;
use crate::dates;
use crate::error::{DbError, OpResultExt, Result};
use crate::migrate::{self, AppliedMigration};
use crate::store::Store;

const PROJECT_COLUMNS: &str = "id, name, description, type, target_date, completed, \
     completed_at, sort_order, created_at, updated_at";

const TASK_COLUMNS: &str = "id, project_id, description, notes, priority, due_date, \
     completed, completed_at, sort_order, created_at, updated_at";

/// Appends after the last sibling unless the caller chose a positive position.
/// MAX is read by the insert itself, so two creates cannot take the same slot.
const INSERT_PROJECT: &str = r#"
    INSERT INTO projects (
        name, description, type, target_date, completed, completed_at,
        sort_order, created_at, updated_at
    )
    SELECT ?, ?, ?, ?, 0, NULL,
           CASE WHEN ? > 0 THEN ? ELSE COALESCE(MAX(sort_order) + 1, 1) END,
           ?, ?
    FROM projects
"#;

/// Selects from the owning project's row, so a missing project inserts
/// nothing whether or not foreign keys are enforced.
const INSERT_TASK: &str = r#"
    INSERT INTO tasks (
        project_id, description, notes, priority, due_date, completed, completed_at,
        sort_order, created_at, updated_at
    )
    SELECT ?, ?, ?, ?, ?, ?, ?,
           CASE WHEN ? > 0 THEN ? ELSE (
               SELECT COALESCE(MAX(sort_order) + 1, 1) FROM tasks WHERE project_id = ?
           ) END,
           ?, ?
    FROM projects
    WHERE id = ?
"#;

/// `completed_at` is computed from the row's current `completed` value in the
/// same statement that overwrites it.
const UPDATE_PROJECT: &str = r#"
    UPDATE projects
    SET name = ?, description = ?, type = ?, target_date = ?,
        completed_at = CASE
            WHEN ? = 0 THEN NULL
            WHEN COALESCE(completed, 0) = 0 THEN ?
            ELSE COALESCE(?, completed_at, ?)
        END,
        completed = ?, sort_order = ?, updated_at = ?
    WHERE id = ?
"#;

const UPDATE_TASK: &str = r#"
    UPDATE tasks
    SET description = ?, notes = ?, priority = ?, due_date = ?,
        completed_at = CASE
            WHEN ? = 0 THEN NULL
            WHEN COALESCE(completed, 0) = 0 THEN ?
            ELSE COALESCE(?, completed_at, ?)
        END,
        completed = ?, sort_order = ?, updated_at = ?
    WHERE id = ?
"#;

const TOGGLE_TASK: &str = r#"
    UPDATE tasks
    SET completed_at = CASE WHEN COALESCE(completed, 0) = 0 THEN ? ELSE NULL END,
        completed = CASE WHEN COALESCE(completed, 0) = 0 THEN 1 ELSE 0 END,
        updated_at = ?
    WHERE id = ?
"#;

const MARK_PROJECT_COMPLETE: &str = r#"
    UPDATE projects
    SET completed_at = CASE
            WHEN COALESCE(completed, 0) != 0 AND completed_at IS NOT NULL THEN completed_at
            ELSE ?
        END,
        completed = 1,
        updated_at = ?
    WHERE id = ?
"#;

const MARK_PROJECT_INCOMPLETE: &str = r#"
    UPDATE projects
    SET completed = 0, completed_at = NULL, updated_at = ?
    WHERE id = ?
"#;

const REORDER_PROJECT: &str = "UPDATE projects SET sort_order = ?, updated_at = ? WHERE id = ?";

const REORDER_TASK: &str =
    "UPDATE tasks SET sort_order = ?, updated_at = ? WHERE id = ? AND project_id = ?";

/// SqliteStore implements [`Store`] over a single turso connection.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    path: String,
}

impl SqliteStore {
    /// Opens (creating if needed) the database described by `config` and
    /// migrates it to the latest schema.
    ///
    /// Any migration failure is fatal: no store is returned.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mytasks_storage::{SqliteStore, StoreConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = SqliteStore::open(StoreConfig::new("./data/mytasks.db")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let path = config.path.to_string_lossy().to_string();

        // Ensure parent directory exists
        if !config.is_in_memory() {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        let db = Builder::new_local(&path)
            .build()
            .await
            .op(|| format!("open database {}", path))?;
        let mut conn = db.connect().op(|| format!("connect to {}", path))?;

        for pragma in config.pragmas() {
            run_pragma(&conn, &pragma)
                .await
                .op(|| format!("apply {}", pragma))?;
        }

        let applied = migrate::run_migrations(&mut conn).await?;
        info!(path = %path, migrations_applied = applied, "store opened");

        Ok(SqliteStore {
            conn: Mutex::new(Some(conn)),
            path,
        })
    }

    /// Opens an on-disk database with default settings.
    pub async fn open_path(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::new(path)).await
    }

    /// Returns the database file path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Ledger rows in version order.
    pub async fn applied_migrations(&self, cx: &OpContext) -> Result<Vec<AppliedMigration>> {
        let mut guard = self.acquire(cx).await?;
        let conn = connection(&mut guard)?;
        cx.run(migrate::applied_migrations(conn)).await
    }

    /// Highest applied migration version, 0 for an empty ledger.
    pub async fn schema_version(&self, cx: &OpContext) -> Result<u32> {
        Ok(self
            .applied_migrations(cx)
            .await?
            .last()
            .map(|m| m.version)
            .unwrap_or(0))
    }

    /// Waits for the connection, bounded by the caller's deadline.
    async fn acquire(&self, cx: &OpContext) -> Result<MutexGuard<'_, Option<Connection>>> {
        let guard = cx.run(async { Ok(self.conn.lock().await) }).await?;
        if guard.is_none() {
            return Err(DbError::Closed);
        }
        Ok(guard)
    }
}

fn connection<'a>(guard: &'a mut MutexGuard<'_, Option<Connection>>) -> Result<&'a mut Connection> {
    match &mut **guard {
        Some(conn) => Ok(conn),
        None => Err(DbError::Closed),
    }
}

/// PRAGMAs may answer with a row; step through it so the setting applies.
async fn run_pragma(conn: &Connection, pragma: &str) -> Result<()> {
    let mut rows = conn.query(pragma, params![]).await?;
    while rows.next().await?.is_some() {}
    Ok(())
}

fn today_text() -> String {
    dates::format_date(mytasks_core::today())
}

fn now_text() -> String {
    dates::format_timestamp(Utc::now())
}

// ===== Row mapping =====

fn project_from_row(row: &turso::Row) -> Result<Project> {
    let description: Option<String> = row.get(2)?;
    let target_date: Option<String> = row.get(4)?;
    let completed: Option<i64> = row.get(5)?;
    let completed_at: Option<String> = row.get(6)?;
    let sort_order: Option<i64> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: description.unwrap_or_default(),
        project_type: row.get(3)?,
        target_date: dates::opt_date(target_date)?,
        completed: completed.unwrap_or(0) != 0,
        completed_at: dates::opt_date(completed_at)?,
        sort_order: sort_order.unwrap_or(0),
        created_at: dates::parse_stored_timestamp(&created_at)?,
        updated_at: dates::parse_stored_timestamp(&updated_at)?,
    })
}

fn task_from_row(row: &turso::Row) -> Result<Task> {
    let due_date: Option<String> = row.get(5)?;
    let completed: Option<i64> = row.get(6)?;
    let completed_at: Option<String> = row.get(7)?;
    let sort_order: Option<i64> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        description: row.get(2)?,
        notes: row.get(3)?,
        priority: row.get(4)?,
        due_date: dates::opt_date(due_date)?,
        completed: completed.unwrap_or(0) != 0,
        completed_at: dates::opt_date(completed_at)?,
        sort_order: sort_order.unwrap_or(0),
        created_at: dates::parse_stored_timestamp(&created_at)?,
        updated_at: dates::parse_stored_timestamp(&updated_at)?,
    })
}

// ===== Queries =====

async fn select_project(conn: &Connection, id: i64) -> Result<Project> {
    let query = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
    let mut rows = conn.query(&query, params![id]).await?;

    if let Some(row) = rows.next().await? {
        project_from_row(&row)
    } else {
        Err(DbError::project_not_found(id))
    }
}

async fn select_last_inserted_project(conn: &Connection) -> Result<Project> {
    let query = format!(
        "SELECT {} FROM projects WHERE id = last_insert_rowid()",
        PROJECT_COLUMNS
    );
    let mut rows = conn.query(&query, params![]).await?;

    match rows.next().await? {
        Some(row) => project_from_row(&row),
        None => Err(DbError::project_not_found(0)),
    }
}

async fn select_projects(conn: &Connection) -> Result<Vec<Project>> {
    let query = format!(
        "SELECT {} FROM projects ORDER BY sort_order ASC, id ASC",
        PROJECT_COLUMNS
    );
    let mut rows = conn.query(&query, params![]).await?;

    let mut projects = Vec::new();
    while let Some(row) = rows.next().await? {
        projects.push(project_from_row(&row)?);
    }
    Ok(projects)
}

async fn select_task(conn: &Connection, id: i64) -> Result<Task> {
    let query = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
    let mut rows = conn.query(&query, params![id]).await?;

    if let Some(row) = rows.next().await? {
        task_from_row(&row)
    } else {
        Err(DbError::task_not_found(id))
    }
}

async fn select_last_inserted_task(conn: &Connection) -> Result<Task> {
    let query = format!(
        "SELECT {} FROM tasks WHERE id = last_insert_rowid()",
        TASK_COLUMNS
    );
    let mut rows = conn.query(&query, params![]).await?;

    match rows.next().await? {
        Some(row) => task_from_row(&row),
        None => Err(DbError::task_not_found(0)),
    }
}

/// Lists tasks of one project matching `conditions`, which are ANDed after
/// the project filter and bound, in order, to `params_vec`.
async fn select_tasks(
    conn: &Connection,
    project_id: i64,
    conditions: &[&str],
    mut params_vec: Vec<turso::Value>,
    order_by: &str,
    limit: usize,
) -> Result<Vec<Task>> {
    let mut query = format!("SELECT {} FROM tasks WHERE project_id = ?", TASK_COLUMNS);
    params_vec.insert(0, project_id.into());

    for condition in conditions {
        query.push_str(" AND ");
        query.push_str(condition);
    }

    query.push_str(" ORDER BY ");
    query.push_str(order_by);

    if limit > 0 {
        query.push_str(" LIMIT ?");
        params_vec.push((limit as i64).into());
    }

    let mut rows = conn.query(&query, params_vec).await?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next().await? {
        tasks.push(task_from_row(&row)?);
    }
    Ok(tasks)
}

// ===== Writes (run inside a transaction by the caller) =====

async fn insert_project(conn: &Connection, project: &Project) -> Result<Project> {
    let now = now_text();
    conn.execute(
        INSERT_PROJECT,
        params![
            project.name.clone(),
            project.description.clone(),
            project.project_type.clone(),
            project.target_date.map(dates::format_date),
            project.sort_order,
            project.sort_order,
            now.clone(),
            now
        ],
    )
    .await?;

    select_last_inserted_project(conn).await
}

async fn rewrite_project(conn: &Connection, project: &Project) -> Result<Project> {
    let today = today_text();
    let changed = conn
        .execute(
            UPDATE_PROJECT,
            params![
                project.name.clone(),
                project.description.clone(),
                project.project_type.clone(),
                project.target_date.map(dates::format_date),
                i64::from(project.completed),
                today.clone(),
                project.completed_at.map(dates::format_date),
                today,
                i64::from(project.completed),
                project.sort_order,
                now_text(),
                project.id
            ],
        )
        .await?;

    if changed == 0 {
        return Err(DbError::project_not_found(project.id));
    }
    select_project(conn, project.id).await
}

async fn remove_project(conn: &Connection, id: i64) -> Result<()> {
    let removed = conn
        .execute("DELETE FROM projects WHERE id = ?", params![id])
        .await?;
    if removed == 0 {
        return Err(DbError::project_not_found(id));
    }

    // Covers connections opened with foreign keys off.
    conn.execute("DELETE FROM tasks WHERE project_id = ?", params![id])
        .await?;
    Ok(())
}

async fn insert_task(conn: &Connection, task: &Task) -> Result<Task> {
    let now = now_text();
    let completed_at = if task.completed {
        Some(dates::format_date(
            task.completed_at.unwrap_or_else(mytasks_core::today),
        ))
    } else {
        None
    };

    let inserted = conn
        .execute(
            INSERT_TASK,
            params![
                task.project_id,
                task.description.clone(),
                task.notes.clone(),
                task.priority.clone(),
                task.due_date.map(dates::format_date),
                i64::from(task.completed),
                completed_at,
                task.sort_order,
                task.sort_order,
                task.project_id,
                now.clone(),
                now,
                task.project_id
            ],
        )
        .await?;

    if inserted == 0 {
        return Err(DbError::project_not_found(task.project_id));
    }
    select_last_inserted_task(conn).await
}

async fn rewrite_task(conn: &Connection, task: &Task) -> Result<Task> {
    let today = today_text();
    let changed = conn
        .execute(
            UPDATE_TASK,
            params![
                task.description.clone(),
                task.notes.clone(),
                task.priority.clone(),
                task.due_date.map(dates::format_date),
                i64::from(task.completed),
                today.clone(),
                task.completed_at.map(dates::format_date),
                today,
                i64::from(task.completed),
                task.sort_order,
                now_text(),
                task.id
            ],
        )
        .await?;

    if changed == 0 {
        return Err(DbError::task_not_found(task.id));
    }
    select_task(conn, task.id).await
}

async fn flip_task(conn: &Connection, id: i64) -> Result<Task> {
    let changed = conn
        .execute(TOGGLE_TASK, params![today_text(), now_text(), id])
        .await?;
    if changed == 0 {
        return Err(DbError::task_not_found(id));
    }
    select_task(conn, id).await
}

/// Sets `sort_order = position + 1` for each id. `project_id` scopes task
/// updates so an id from another project is left alone.
///
/// Stops between rows once `cx` expires; the caller rolls back.
async fn rewrite_sort_order(
    conn: &Connection,
    cx: &OpContext,
    statement: &str,
    project_id: Option<i64>,
    ids: &[i64],
) -> Result<()> {
    let now = now_text();
    for (position, id) in ids.iter().enumerate() {
        cx.check()?;
        let sort_order = position as i64 + 1;
        match project_id {
            Some(project_id) => {
                conn.execute(statement, params![sort_order, now.clone(), *id, project_id])
                    .await?
            }
            None => {
                conn.execute(statement, params![sort_order, now.clone(), *id])
                    .await?
            }
        };
    }
    Ok(())
}

/// Runs `$body` (an expression using `$tx`) in a transaction on `$conn`,
/// committing on success and rolling back on error.
macro_rules! transaction {
    ($conn:expr, |$tx:ident| $body:expr) => {
        match $conn.transaction().await {
            Err(err) => Err(DbError::from(err)),
            Ok($tx) => match $body.await {
                Ok(value) => $tx.commit().await.map(|_| value).map_err(DbError::from),
                Err(err) => {
                    // Nothing is committed either way; keep the first error.
                    let _ = $tx.rollback().await;
                    Err(err)
                }
            },
        }
    };
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_project(&self, cx: &OpContext, project: &Project) -> Result<Project> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let result = transaction!(conn, |tx| insert_project(&tx, project));
        result.op(|| "create project".to_string())
    }

    async fn get_project(&self, cx: &OpContext, id: i64) -> Result<Project> {
        let mut guard = self.acquire(cx).await?;
        let conn = connection(&mut guard)?;
        cx.run(select_project(conn, id))
            .await
            .op(|| format!("get project {}", id))
    }

    async fn list_projects(&self, cx: &OpContext) -> Result<Vec<Project>> {
        let mut guard = self.acquire(cx).await?;
        let conn = connection(&mut guard)?;
        cx.run(select_projects(conn))
            .await
            .op(|| "list projects".to_string())
    }

    async fn update_project(&self, cx: &OpContext, project: &Project) -> Result<Project> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let result = transaction!(conn, |tx| rewrite_project(&tx, project));
        result.op(|| format!("update project {}", project.id))
    }

    async fn delete_project(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let result = transaction!(conn, |tx| remove_project(&tx, id));
        result.op(|| format!("delete project {}", id))
    }

    async fn reorder_projects(&self, cx: &OpContext, ids: &[i64]) -> Result<()> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        transaction!(conn, |tx| rewrite_sort_order(&tx, cx, REORDER_PROJECT, None, ids))
            .op(|| "reorder projects".to_string())?;
        debug!(count = ids.len(), "reordered projects");
        Ok(())
    }

    async fn mark_project_complete(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let changed = conn
            .execute(MARK_PROJECT_COMPLETE, params![today_text(), now_text(), id])
            .await
            .op(|| format!("mark project {} complete", id))?;
        if changed == 0 {
            return Err(DbError::project_not_found(id));
        }
        Ok(())
    }

    async fn mark_project_incomplete(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let changed = conn
            .execute(MARK_PROJECT_INCOMPLETE, params![now_text(), id])
            .await
            .op(|| format!("mark project {} incomplete", id))?;
        if changed == 0 {
            return Err(DbError::project_not_found(id));
        }
        Ok(())
    }

    async fn create_task(&self, cx: &OpContext, task: &Task) -> Result<Task> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let result = transaction!(conn, |tx| insert_task(&tx, task));
        result.op(|| format!("create task in project {}", task.project_id))
    }

    async fn get_task(&self, cx: &OpContext, id: i64) -> Result<Task> {
        let mut guard = self.acquire(cx).await?;
        let conn = connection(&mut guard)?;
        cx.run(select_task(conn, id))
            .await
            .op(|| format!("get task {}", id))
    }

    async fn list_tasks_by_project(
        &self,
        cx: &OpContext,
        project_id: i64,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let mut guard = self.acquire(cx).await?;
        let conn = connection(&mut guard)?;
        cx.run(select_tasks(
            conn,
            project_id,
            &[],
            Vec::new(),
            "sort_order ASC, id ASC",
            limit,
        ))
        .await
        .op(|| format!("list tasks of project {}", project_id))
    }

    async fn list_tasks_by_project_filtered(
        &self,
        cx: &OpContext,
        project_id: i64,
        completed: bool,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let mut guard = self.acquire(cx).await?;
        let conn = connection(&mut guard)?;
        cx.run(select_tasks(
            conn,
            project_id,
            &["COALESCE(completed, 0) = ?"],
            vec![i64::from(completed).into()],
            "sort_order ASC, id ASC",
            limit,
        ))
        .await
        .op(|| format!("list tasks of project {}", project_id))
    }

    async fn list_tasks_completed_between(
        &self,
        cx: &OpContext,
        project_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<Task>> {
        // Compare on the date prefix so datetime-encoded legacy values match.
        let mut conditions = vec!["completed != 0", "completed_at IS NOT NULL"];
        let mut params_vec: Vec<turso::Value> = Vec::new();

        if let Some(from) = from {
            conditions.push("substr(completed_at, 1, 10) >= ?");
            params_vec.push(dates::format_date(from).into());
        }

        if let Some(to) = to {
            conditions.push("substr(completed_at, 1, 10) <= ?");
            params_vec.push(dates::format_date(to).into());
        }

        let mut guard = self.acquire(cx).await?;
        let conn = connection(&mut guard)?;
        cx.run(select_tasks(
            conn,
            project_id,
            &conditions,
            params_vec,
            "completed_at DESC, sort_order ASC, id ASC",
            limit,
        ))
        .await
        .op(|| format!("list completed tasks of project {}", project_id))
    }

    async fn update_task(&self, cx: &OpContext, task: &Task) -> Result<Task> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let result = transaction!(conn, |tx| rewrite_task(&tx, task));
        result.op(|| format!("update task {}", task.id))
    }

    async fn delete_task(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let removed = conn
            .execute("DELETE FROM tasks WHERE id = ?", params![id])
            .await
            .op(|| format!("delete task {}", id))?;
        if removed == 0 {
            return Err(DbError::task_not_found(id));
        }
        Ok(())
    }

    async fn toggle_task_complete(&self, cx: &OpContext, id: i64) -> Result<Task> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        let result = transaction!(conn, |tx| flip_task(&tx, id));
        result.op(|| format!("toggle task {}", id))
    }

    async fn reorder_tasks(&self, cx: &OpContext, project_id: i64, ids: &[i64]) -> Result<()> {
        let mut guard = self.acquire(cx).await?;
        cx.check()?;
        let conn = connection(&mut guard)?;

        transaction!(conn, |tx| rewrite_sort_order(&tx, cx, REORDER_TASK, Some(project_id), ids))
            .op(|| format!("reorder tasks of project {}", project_id))?;
        debug!(project_id, count = ids.len(), "reordered tasks");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if guard.take().is_some() {
            debug!(path = %self.path, "store closed");
        }
        Ok(())
    }
}
