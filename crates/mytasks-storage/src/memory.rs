//! In-memory [`Store`] for tests and tooling that should not touch disk.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mytasks_core::{Project, Task};
use tokio::sync::{Mutex, MutexGuard};

use crate::context::OpContext;
use crate::error::{DbError, Result};
use crate::store::Store;

#[derive(Default)]
struct State {
    projects: BTreeMap<i64, Project>,
    tasks: BTreeMap<i64, Task>,
    last_project_id: i64,
    last_task_id: i64,
    closed: bool,
}

impl State {
    fn project_mut(&mut self, id: i64) -> Result<&mut Project> {
        self.projects
            .get_mut(&id)
            .ok_or_else(|| DbError::project_not_found(id))
    }

    fn task_mut(&mut self, id: i64) -> Result<&mut Task> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| DbError::task_not_found(id))
    }

    fn next_project_sort_order(&self) -> i64 {
        self.projects
            .values()
            .map(|p| p.sort_order)
            .max()
            .map_or(1, |max| max + 1)
    }

    fn next_task_sort_order(&self, project_id: i64) -> i64 {
        self.tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .map(|t| t.sort_order)
            .max()
            .map_or(1, |max| max + 1)
    }

    fn project_tasks(&self, project_id: i64) -> impl Iterator<Item = &Task> {
        self.tasks
            .values()
            .filter(move |t| t.project_id == project_id)
    }
}

/// Completion date after an edit that sets `completed` to `completed`.
fn next_completed_at(
    was_completed: bool,
    completed: bool,
    supplied: Option<NaiveDate>,
    existing: Option<NaiveDate>,
) -> Option<NaiveDate> {
    match (was_completed, completed) {
        (_, false) => None,
        (false, true) => Some(mytasks_core::today()),
        (true, true) => supplied
            .or(existing)
            .or_else(|| Some(mytasks_core::today())),
    }
}

fn sorted(mut tasks: Vec<Task>, limit: usize) -> Vec<Task> {
    tasks.sort_by_key(|t| (t.sort_order, t.id));
    if limit > 0 {
        tasks.truncate(limit);
    }
    tasks
}

/// MemoryStore keeps everything in ordered maps behind one lock and follows
/// the same rules as [`crate::SqliteStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, cx: &OpContext) -> Result<MutexGuard<'_, State>> {
        let guard = cx.run(async { Ok(self.state.lock().await) }).await?;
        if guard.closed {
            return Err(DbError::Closed);
        }
        Ok(guard)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_project(&self, cx: &OpContext, project: &Project) -> Result<Project> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let now = Utc::now();
        state.last_project_id += 1;
        let created = Project {
            id: state.last_project_id,
            completed: false,
            completed_at: None,
            sort_order: if project.sort_order > 0 {
                project.sort_order
            } else {
                state.next_project_sort_order()
            },
            created_at: now,
            updated_at: now,
            ..project.clone()
        };
        state.projects.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_project(&self, cx: &OpContext, id: i64) -> Result<Project> {
        let mut state = self.acquire(cx).await?;
        state.project_mut(id).map(|p| p.clone())
    }

    async fn list_projects(&self, cx: &OpContext) -> Result<Vec<Project>> {
        let state = self.acquire(cx).await?;
        let mut projects: Vec<Project> = state.projects.values().cloned().collect();
        projects.sort_by_key(|p| (p.sort_order, p.id));
        Ok(projects)
    }

    async fn update_project(&self, cx: &OpContext, project: &Project) -> Result<Project> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let stored = state.project_mut(project.id)?;
        let completed_at = next_completed_at(
            stored.completed,
            project.completed,
            project.completed_at,
            stored.completed_at,
        );
        *stored = Project {
            completed_at,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..project.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_project(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        if state.projects.remove(&id).is_none() {
            return Err(DbError::project_not_found(id));
        }
        state.tasks.retain(|_, t| t.project_id != id);
        Ok(())
    }

    async fn reorder_projects(&self, cx: &OpContext, ids: &[i64]) -> Result<()> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let now = Utc::now();
        for (position, id) in ids.iter().enumerate() {
            if let Some(project) = state.projects.get_mut(id) {
                project.sort_order = position as i64 + 1;
                project.updated_at = now;
            }
        }
        Ok(())
    }

    async fn mark_project_complete(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let project = state.project_mut(id)?;
        if !(project.completed && project.completed_at.is_some()) {
            project.completed_at = Some(mytasks_core::today());
        }
        project.completed = true;
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_project_incomplete(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let project = state.project_mut(id)?;
        project.completed = false;
        project.completed_at = None;
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn create_task(&self, cx: &OpContext, task: &Task) -> Result<Task> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        if !state.projects.contains_key(&task.project_id) {
            return Err(DbError::project_not_found(task.project_id));
        }

        let now = Utc::now();
        let sort_order = if task.sort_order > 0 {
            task.sort_order
        } else {
            state.next_task_sort_order(task.project_id)
        };
        state.last_task_id += 1;
        let created = Task {
            id: state.last_task_id,
            completed_at: task
                .completed
                .then(|| task.completed_at.unwrap_or_else(mytasks_core::today)),
            sort_order,
            created_at: now,
            updated_at: now,
            ..task.clone()
        };
        state.tasks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_task(&self, cx: &OpContext, id: i64) -> Result<Task> {
        let mut state = self.acquire(cx).await?;
        state.task_mut(id).map(|t| t.clone())
    }

    async fn list_tasks_by_project(
        &self,
        cx: &OpContext,
        project_id: i64,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let state = self.acquire(cx).await?;
        Ok(sorted(state.project_tasks(project_id).cloned().collect(), limit))
    }

    async fn list_tasks_by_project_filtered(
        &self,
        cx: &OpContext,
        project_id: i64,
        completed: bool,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let state = self.acquire(cx).await?;
        let tasks = state
            .project_tasks(project_id)
            .filter(|t| t.completed == completed)
            .cloned()
            .collect();
        Ok(sorted(tasks, limit))
    }

    async fn list_tasks_completed_between(
        &self,
        cx: &OpContext,
        project_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let state = self.acquire(cx).await?;
        let mut tasks: Vec<Task> = state
            .project_tasks(project_id)
            .filter(|t| t.completed)
            .filter(|t| match t.completed_at {
                Some(done) => from.map_or(true, |f| done >= f) && to.map_or(true, |e| done <= e),
                None => false,
            })
            .cloned()
            .collect();

        tasks.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then(a.sort_order.cmp(&b.sort_order))
                .then(a.id.cmp(&b.id))
        });
        if limit > 0 {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn update_task(&self, cx: &OpContext, task: &Task) -> Result<Task> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let stored = state.task_mut(task.id)?;
        let completed_at = next_completed_at(
            stored.completed,
            task.completed,
            task.completed_at,
            stored.completed_at,
        );
        *stored = Task {
            project_id: stored.project_id,
            completed_at,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..task.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_task(&self, cx: &OpContext, id: i64) -> Result<()> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        state
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::task_not_found(id))
    }

    async fn toggle_task_complete(&self, cx: &OpContext, id: i64) -> Result<Task> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let task = state.task_mut(id)?;
        task.completed = !task.completed;
        task.completed_at = task.completed.then(mytasks_core::today);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn reorder_tasks(&self, cx: &OpContext, project_id: i64, ids: &[i64]) -> Result<()> {
        let mut state = self.acquire(cx).await?;
        cx.check()?;

        let now = Utc::now();
        for (position, id) in ids.iter().enumerate() {
            match state.tasks.get_mut(id) {
                Some(task) if task.project_id == project_id => {
                    task.sort_order = position as i64 + 1;
                    task.updated_at = now;
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().await.closed = true;
        Ok(())
    }
}
