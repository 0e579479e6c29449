//! Tasks owned by a project.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Longest accepted notes text, in characters.
pub const MAX_NOTES_LEN: usize = 255;

/// Rank given to a priority string that is not one of the known values.
const UNKNOWN_PRIORITY_RANK: i32 = 99;

/// Task represents a single actionable item within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    // ===== Core Identification =====
    #[serde(default)]
    pub id: i64,
    pub project_id: i64,

    // ===== Content =====
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// "high", "medium" or "low"
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    // ===== Completion =====
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDate>,

    // ===== Ordering =====
    /// Position within the owning project. Zero or negative asks the store to append.
    #[serde(default)]
    pub sort_order: i64,

    // ===== Timestamps =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds an unsaved task under `project_id` that the store will append.
    pub fn new(project_id: i64, description: impl Into<String>, priority: Priority) -> Self {
        let now = Utc::now();
        Task {
            id: 0,
            project_id,
            description: description.into(),
            notes: None,
            priority: priority.as_str().to_string(),
            due_date: None,
            completed: false,
            completed_at: None,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate checks that the task has valid field values.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::validation("description is required"));
        }

        if self.project_id == 0 {
            return Err(Error::validation("project_id is required"));
        }

        if self.priority.parse::<Priority>().is_err() {
            return Err(Error::validation(
                "priority must be 'high', 'medium', or 'low'",
            ));
        }

        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(Error::validation(format!(
                    "notes must be {} characters or fewer",
                    MAX_NOTES_LEN
                )));
            }
        }

        Ok(())
    }

    /// Returns true if the task is open and its due date lies before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }

    /// Numeric rank for sorting by priority. Lower is more urgent.
    pub fn priority_rank(&self) -> i32 {
        self.priority
            .parse::<Priority>()
            .map(|p| p.rank())
            .unwrap_or(UNKNOWN_PRIORITY_RANK)
    }
}

/// Priority levels for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn rank(&self) -> i32 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(Error::InvalidPriority(other.to_string())),
        }
    }
}
