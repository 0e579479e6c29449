//! Core types for the mytasks tracker.
//!
//! Projects (or ongoing categories) own ordered tasks. This crate holds the
//! data model, the validation rules every caller runs before handing values
//! to a store, and the agenda views built on top of store listings.

pub mod agenda;
pub mod error;
pub mod project;
pub mod task;

pub use error::{Error, Result};
pub use project::{Project, ProjectType};
pub use task::{Priority, Task, MAX_NOTES_LEN};

use chrono::{Local, NaiveDate};

/// Current calendar day in the local timezone.
///
/// Completion dates, due dates and overdue checks all work on calendar days,
/// so this is the single definition of "today" shared by every crate.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
