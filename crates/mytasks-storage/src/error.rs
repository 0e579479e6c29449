//! Storage error types.

use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("turso error: {0}")]
    Turso(#[from] turso::Error),

    /// An engine failure tagged with the operation that hit it.
    #[error("failed to {op}: {source}")]
    Operation {
        op: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("invalid date format: {0:?}")]
    InvalidDate(String),

    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("operation cancelled: deadline exceeded")]
    DeadlineExceeded,

    #[error("store is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    pub(crate) fn project_not_found(id: i64) -> Self {
        DbError::NotFound {
            entity: "project",
            id,
        }
    }

    pub(crate) fn task_not_found(id: i64) -> Self {
        DbError::NotFound { entity: "task", id }
    }

    /// True when the requested row does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            DbError::NotFound { .. } => true,
            DbError::Operation { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// True when the call gave up because its deadline passed.
    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            DbError::DeadlineExceeded => true,
            DbError::Operation { source, .. } => source.is_deadline_exceeded(),
            _ => false,
        }
    }
}

/// Fatal schema migration failures. None of these leave the store usable.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid migration filename {0:?}: expected '<version>_<name>.sql'")]
    InvalidFilename(String),

    #[error("invalid migration version in {filename:?}: {source}")]
    InvalidVersion {
        filename: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("duplicate migration version: {0}")]
    DuplicateVersion(u32),

    #[error("failed to apply migration {version}_{name}: {source}")]
    Apply {
        version: u32,
        name: String,
        #[source]
        source: turso::Error,
    },

    #[error("failed to {action} schema_migrations: {source}")]
    Ledger {
        action: &'static str,
        #[source]
        source: turso::Error,
    },

    #[error("invalid version {0} in schema_migrations")]
    InvalidLedgerVersion(i64),

    #[error("failed to bootstrap legacy schema: {0}")]
    Bootstrap(#[source] turso::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Attaches an operation description to storage failures.
///
/// `NotFound` passes through untouched so callers can still match on it.
pub(crate) trait OpResultExt<T> {
    fn op<F>(self, describe: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> OpResultExt<T> for std::result::Result<T, E>
where
    E: Into<DbError>,
{
    fn op<F>(self, describe: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| match err.into() {
            err @ DbError::NotFound { .. } => err,
            err @ DbError::Operation { .. } => err,
            err => DbError::Operation {
                op: describe(),
                source: Box::new(err),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_survives_op_context() {
        let res: Result<()> = Err(DbError::task_not_found(7));
        let err = res.op(|| "get task 7".to_string()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "task not found: 7");
    }

    #[test]
    fn test_op_context_wraps_other_errors() {
        let res: Result<()> = Err(DbError::InvalidDate("yesterday".to_string()));
        let err = res.op(|| "get task 3".to_string()).unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "failed to get task 3: invalid date format: \"yesterday\""
        );
    }

    #[test]
    fn test_deadline_detected_through_context() {
        let res: Result<()> = Err(DbError::DeadlineExceeded);
        let err = res.op(|| "reorder tasks".to_string()).unwrap_err();
        assert!(err.is_deadline_exceeded());
    }
}
