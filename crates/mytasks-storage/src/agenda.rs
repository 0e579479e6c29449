//! Builds agenda views from a [`Store`].

use chrono::NaiveDate;
use mytasks_core::agenda::{
    upcoming_tasks, Agenda, AgendaRequest, ProjectTasks, ACTIVE_PREVIEW_LIMIT,
};

use crate::context::OpContext;
use crate::error::Result;
use crate::store::Store;

/// Loads the agenda described by `request` as of `today`.
///
/// Completed projects are left out of every view. Every call goes through
/// `store`, so the same deadline covers the whole view.
pub async fn load_agenda<S>(
    store: &S,
    cx: &OpContext,
    request: AgendaRequest,
    today: NaiveDate,
) -> Result<Agenda>
where
    S: Store + ?Sized,
{
    let projects = store.list_projects(cx).await?;

    match request {
        AgendaRequest::Active => {
            let mut groups = Vec::new();
            for project in projects.into_iter().filter(|p| !p.completed) {
                let tasks = store
                    .list_tasks_by_project_filtered(cx, project.id, false, ACTIVE_PREVIEW_LIMIT)
                    .await?;
                groups.push(ProjectTasks { project, tasks });
            }
            Ok(Agenda::Active { projects: groups })
        }
        AgendaRequest::Completed(range) => {
            let mut groups = Vec::new();
            for project in projects.into_iter().filter(|p| !p.completed) {
                let tasks = store
                    .list_tasks_completed_between(
                        cx,
                        project.id,
                        Some(range.start),
                        Some(range.end),
                        0,
                    )
                    .await?;
                if !tasks.is_empty() {
                    groups.push(ProjectTasks { project, tasks });
                }
            }
            Ok(Agenda::Completed {
                range,
                projects: groups,
            })
        }
        AgendaRequest::Upcoming(window) => {
            let mut groups = Vec::new();
            for project in projects.into_iter().filter(|p| !p.completed) {
                let tasks = store
                    .list_tasks_by_project_filtered(cx, project.id, false, 0)
                    .await?;
                groups.push(ProjectTasks { project, tasks });
            }
            Ok(Agenda::Upcoming {
                window,
                tasks: upcoming_tasks(&groups, today, window),
            })
        }
    }
}
