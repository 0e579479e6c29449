//! The storage contract.

use async_trait::async_trait;
use chrono::NaiveDate;
use mytasks_core::{Project, Task};

use crate::context::OpContext;
use crate::error::Result;

/// Store is the only gateway to persisted projects and tasks.
///
/// Values passed in are read, never retained; values returned are owned
/// copies. Lookups of a missing id fail with [`crate::DbError::NotFound`].
/// Callers run [`Project::validate`] / [`Task::validate`] first; the store
/// does not repeat those checks.
///
/// A `limit` of 0 means no limit.
#[async_trait]
pub trait Store: Send + Sync {
    // ===== Projects =====

    /// Inserts a project. A `sort_order` of 0 or less appends it after every
    /// existing project. New projects always start incomplete.
    async fn create_project(&self, cx: &OpContext, project: &Project) -> Result<Project>;

    async fn get_project(&self, cx: &OpContext, id: i64) -> Result<Project>;

    /// All projects by `sort_order`, ties in insertion order.
    async fn list_projects(&self, cx: &OpContext) -> Result<Vec<Project>>;

    /// Overwrites every editable field and bumps `updated_at`.
    ///
    /// `completed_at` is set to today on an incomplete → complete change,
    /// cleared on complete → incomplete, and otherwise kept (or replaced by
    /// the supplied value when one is given).
    async fn update_project(&self, cx: &OpContext, project: &Project) -> Result<Project>;

    /// Deletes the project and every task it owns.
    async fn delete_project(&self, cx: &OpContext, id: i64) -> Result<()>;

    /// Rewrites `sort_order` to each id's 1-based position in `ids`.
    ///
    /// The list is not checked to be a permutation: ids not listed keep their
    /// order, unknown ids are ignored, and a repeated id ends at its last
    /// position.
    async fn reorder_projects(&self, cx: &OpContext, ids: &[i64]) -> Result<()>;

    /// Marks complete. An already-complete project keeps its completion date.
    async fn mark_project_complete(&self, cx: &OpContext, id: i64) -> Result<()>;

    /// Clears `completed` and `completed_at`.
    async fn mark_project_incomplete(&self, cx: &OpContext, id: i64) -> Result<()>;

    // ===== Tasks =====

    /// Inserts a task. A `sort_order` of 0 or less appends it after every
    /// existing task of the same project.
    async fn create_task(&self, cx: &OpContext, task: &Task) -> Result<Task>;

    async fn get_task(&self, cx: &OpContext, id: i64) -> Result<Task>;

    async fn list_tasks_by_project(
        &self,
        cx: &OpContext,
        project_id: i64,
        limit: usize,
    ) -> Result<Vec<Task>>;

    async fn list_tasks_by_project_filtered(
        &self,
        cx: &OpContext,
        project_id: i64,
        completed: bool,
        limit: usize,
    ) -> Result<Vec<Task>>;

    /// Completed tasks whose completion date lies within `[from, to]`;
    /// a missing bound is not applied. Newest completion first.
    async fn list_tasks_completed_between(
        &self,
        cx: &OpContext,
        project_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<Task>>;

    /// Same completion rule as [`Store::update_project`], decided atomically
    /// against the stored row.
    async fn update_task(&self, cx: &OpContext, task: &Task) -> Result<Task>;

    async fn delete_task(&self, cx: &OpContext, id: i64) -> Result<()>;

    /// Flips `completed`, setting or clearing `completed_at` in the same write.
    async fn toggle_task_complete(&self, cx: &OpContext, id: i64) -> Result<Task>;

    /// Like [`Store::reorder_projects`], restricted to tasks of `project_id`.
    async fn reorder_tasks(&self, cx: &OpContext, project_id: i64, ids: &[i64]) -> Result<()>;

    // ===== Lifecycle =====

    /// Releases the connection. Later calls fail with [`crate::DbError::Closed`];
    /// closing twice is a no-op.
    async fn close(&self) -> Result<()>;
}
