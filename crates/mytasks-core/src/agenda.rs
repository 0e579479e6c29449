//! Agenda views over projects and their tasks.
//!
//! These are pure functions over values already loaded from a store: the
//! storage crate fetches, this module filters and orders.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::{Error, Project, Result, Task};

/// Number of open tasks previewed per project on the active view.
pub const ACTIVE_PREVIEW_LIMIT: usize = 3;

/// Default length of the completed-tasks lookback, in days.
pub const DEFAULT_COMPLETED_LOOKBACK_DAYS: i64 = 30;

/// The three agenda tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaTab {
    #[default]
    Active,
    Completed,
    Upcoming,
}

impl AgendaTab {
    /// Parses a tab name; anything unrecognised is the active tab.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => AgendaTab::Completed,
            "upcoming" => AgendaTab::Upcoming,
            _ => AgendaTab::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgendaTab::Active => "active",
            AgendaTab::Completed => "completed",
            AgendaTab::Upcoming => "upcoming",
        }
    }
}

impl std::fmt::Display for AgendaTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far ahead the upcoming view looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpcomingWindow(u32);

impl UpcomingWindow {
    pub const ALLOWED_DAYS: [u32; 3] = [7, 14, 30];

    pub fn new(days: u32) -> Result<Self> {
        if Self::ALLOWED_DAYS.contains(&days) {
            Ok(UpcomingWindow(days))
        } else {
            Err(Error::Validation("days must be 7, 14, or 30".to_string()))
        }
    }

    pub fn days(&self) -> u32 {
        self.0
    }

    /// Last due date (inclusive) that falls inside the window.
    pub fn end(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(i64::from(self.0))
    }
}

impl Default for UpcomingWindow {
    fn default() -> Self {
        UpcomingWindow(30)
    }
}

/// Inclusive completion-date range for the completed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CompletedRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::Validation(
                "start_date cannot be after end_date".to_string(),
            ));
        }
        Ok(CompletedRange { start, end })
    }

    /// The default lookback ending on `today`.
    pub fn last_days(today: NaiveDate, days: i64) -> Self {
        CompletedRange {
            start: today - Duration::days(days),
            end: today,
        }
    }
}

/// Which agenda to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgendaRequest {
    /// First few open tasks of every open project.
    Active,
    /// Tasks completed within the range, grouped by project.
    Completed(CompletedRange),
    /// Open tasks due within the window, flattened across projects.
    Upcoming(UpcomingWindow),
}

/// A project together with the tasks selected for a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectTasks {
    pub project: Project,
    pub tasks: Vec<Task>,
}

/// A task on the upcoming view, annotated with its project's name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingTask {
    pub task: Task,
    pub project_name: String,
    pub overdue: bool,
}

/// Agenda is the result of one [`AgendaRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tab", rename_all = "snake_case")]
pub enum Agenda {
    Active {
        projects: Vec<ProjectTasks>,
    },
    Completed {
        range: CompletedRange,
        projects: Vec<ProjectTasks>,
    },
    Upcoming {
        window: UpcomingWindow,
        tasks: Vec<UpcomingTask>,
    },
}

/// Collects open, dated tasks due on or before the end of `window`.
///
/// Overdue tasks come first, then by due date, then by priority rank.
/// Completed projects and completed tasks are skipped.
pub fn upcoming_tasks(
    groups: &[ProjectTasks],
    today: NaiveDate,
    window: UpcomingWindow,
) -> Vec<UpcomingTask> {
    let end = window.end(today);
    let mut upcoming: Vec<UpcomingTask> = groups
        .iter()
        .filter(|group| !group.project.completed)
        .flat_map(|group| {
            group
                .tasks
                .iter()
                .filter(|task| !task.completed)
                .filter_map(move |task| {
                    let due = task.due_date?;
                    if due > end {
                        return None;
                    }
                    Some(UpcomingTask {
                        task: task.clone(),
                        project_name: group.project.name.clone(),
                        overdue: due < today,
                    })
                })
        })
        .collect();

    upcoming.sort_by(|a, b| {
        b.overdue
            .cmp(&a.overdue)
            .then_with(|| a.task.due_date.cmp(&b.task.due_date))
            .then_with(|| a.task.priority_rank().cmp(&b.task.priority_rank()))
    });

    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Priority, ProjectType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dated_task(id: i64, desc: &str, priority: Priority, due: Option<NaiveDate>) -> Task {
        let mut t = Task::new(1, desc, priority);
        t.id = id;
        t.due_date = due;
        t
    }

    #[test]
    fn test_agenda_tab_parse_is_lenient() {
        assert_eq!(AgendaTab::parse("completed"), AgendaTab::Completed);
        assert_eq!(AgendaTab::parse(" Upcoming "), AgendaTab::Upcoming);
        assert_eq!(AgendaTab::parse("active"), AgendaTab::Active);
        assert_eq!(AgendaTab::parse("bogus"), AgendaTab::Active);
        assert_eq!(AgendaTab::parse(""), AgendaTab::Active);
        assert_eq!(AgendaTab::Upcoming.to_string(), "upcoming");
    }

    #[test]
    fn test_upcoming_window_values() {
        for days in UpcomingWindow::ALLOWED_DAYS {
            assert_eq!(UpcomingWindow::new(days).unwrap().days(), days);
        }
        assert!(UpcomingWindow::new(10).is_err());
        assert_eq!(UpcomingWindow::default().days(), 30);
    }

    #[test]
    fn test_completed_range_rejects_inverted_bounds() {
        assert!(CompletedRange::new(date(2025, 2, 1), date(2025, 2, 28)).is_ok());
        assert!(CompletedRange::new(date(2025, 2, 1), date(2025, 2, 1)).is_ok());
        assert_eq!(
            CompletedRange::new(date(2025, 3, 1), date(2025, 2, 1)).unwrap_err(),
            Error::Validation("start_date cannot be after end_date".to_string())
        );

        let range = CompletedRange::last_days(date(2025, 2, 5), 30);
        assert_eq!(range.start, date(2025, 1, 6));
        assert_eq!(range.end, date(2025, 2, 5));
    }

    #[test]
    fn test_upcoming_tasks_order_and_filtering() {
        let today = date(2025, 2, 5);
        let mut project = Project::new("Home", ProjectType::Project);
        project.id = 1;

        let mut done = dated_task(5, "done", Priority::High, Some(date(2025, 2, 1)));
        done.completed = true;

        let group = ProjectTasks {
            project,
            tasks: vec![
                dated_task(1, "later-low", Priority::Low, Some(date(2025, 2, 10))),
                dated_task(2, "later-high", Priority::High, Some(date(2025, 2, 10))),
                dated_task(3, "overdue", Priority::Low, Some(date(2025, 2, 1))),
                dated_task(4, "undated", Priority::High, None),
                done,
                dated_task(6, "too-far", Priority::High, Some(date(2025, 3, 30))),
            ],
        };

        let upcoming = upcoming_tasks(&[group], today, UpcomingWindow::new(7).unwrap());
        let order: Vec<&str> = upcoming.iter().map(|u| u.task.description.as_str()).collect();
        assert_eq!(order, vec!["overdue", "later-high", "later-low"]);
        assert!(upcoming[0].overdue);
        assert!(!upcoming[1].overdue);
        assert_eq!(upcoming[0].project_name, "Home");
    }

    #[test]
    fn test_upcoming_tasks_skips_completed_projects() {
        let today = date(2025, 2, 5);
        let mut project = Project::new("Old", ProjectType::Project);
        project.completed = true;

        let group = ProjectTasks {
            project,
            tasks: vec![dated_task(1, "t", Priority::High, Some(today))],
        };

        assert!(upcoming_tasks(&[group], today, UpcomingWindow::default()).is_empty());
    }
}
