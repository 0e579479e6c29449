//! Store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "./data/mytasks.db";

/// Environment variable that overrides [`DEFAULT_DB_PATH`].
pub const DB_PATH_ENV: &str = "DB_PATH";

/// Special path that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// StoreConfig holds everything fixed at store construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file, or [`IN_MEMORY`].
    pub path: PathBuf,

    /// Enforce foreign keys (task → project cascade).
    pub foreign_keys: bool,

    /// Use the write-ahead log so readers are not blocked by the writer.
    pub wal: bool,

    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A private database that lives as long as the store. No WAL: there is
    /// no file to journal.
    pub fn in_memory() -> Self {
        StoreConfig {
            wal: false,
            ..Self::new(IN_MEMORY)
        }
    }

    /// Reads `DB_PATH`, falling back to [`DEFAULT_DB_PATH`].
    pub fn from_env() -> Self {
        match std::env::var(DB_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(IN_MEMORY)
    }

    /// PRAGMA statements issued right after connecting.
    pub(crate) fn pragmas(&self) -> Vec<String> {
        let mut pragmas = Vec::with_capacity(3);
        if self.wal {
            pragmas.push("PRAGMA journal_mode=WAL".to_string());
        }
        pragmas.push(format!(
            "PRAGMA busy_timeout={}",
            self.busy_timeout.as_millis()
        ));
        pragmas.push(format!(
            "PRAGMA foreign_keys={}",
            if self.foreign_keys { "ON" } else { "OFF" }
        ));
        pragmas
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: PathBuf::from(DEFAULT_DB_PATH),
            foreign_keys: true,
            wal: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}
