//! Projects and categories.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Project represents a goal-bearing project or an ongoing category that
/// groups tasks.
///
/// `project_type` is kept as text so values read from storage or forms can be
/// checked by [`Project::validate`]; [`ProjectType`] is the typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    // ===== Core Identification =====
    /// Assigned by storage on creation; 0 until then.
    #[serde(default)]
    pub id: i64,

    // ===== Content =====
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// "project" or "category"
    #[serde(rename = "type")]
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,

    // ===== Completion =====
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDate>,

    // ===== Ordering =====
    /// Position among all projects. Zero or negative asks the store to append.
    #[serde(default)]
    pub sort_order: i64,

    // ===== Timestamps =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Builds an unsaved project that the store will append at the end.
    pub fn new(name: impl Into<String>, project_type: ProjectType) -> Self {
        let now = Utc::now();
        Project {
            id: 0,
            name: name.into(),
            description: String::new(),
            project_type: project_type.as_str().to_string(),
            target_date: None,
            completed: false,
            completed_at: None,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate checks that the project has valid field values.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }

        let project_type = self
            .project_type
            .parse::<ProjectType>()
            .map_err(|_| Error::validation("type must be 'project' or 'category'"))?;

        if project_type == ProjectType::Category && self.target_date.is_some() {
            return Err(Error::validation("category cannot have a target date"));
        }

        Ok(())
    }

    /// Returns true if this project is an ongoing category.
    pub fn is_category(&self) -> bool {
        self.project_type == ProjectType::Category.as_str()
    }

    /// Returns true if the target date lies before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.target_date.is_some_and(|target| target < today)
    }
}

/// ProjectType distinguishes dated projects from ongoing categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Project,
    Category,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Project => "project",
            ProjectType::Category => "category",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "project" => Ok(ProjectType::Project),
            "category" => Ok(ProjectType::Category),
            other => Err(Error::InvalidProjectType(other.to_string())),
        }
    }
}
