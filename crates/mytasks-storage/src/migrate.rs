//! Schema migrations.
//!
//! Scripts live in `migrations/` as `<version>_<name>.sql` and are embedded at
//! build time. The `schema_migrations` ledger records each applied version.
//! Databases created before the ledger existed are bootstrapped by inferring
//! the versions their existing columns already cover.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use turso::{params, Connection};

use crate::dates;
use crate::error::{MigrationError, Result};

/// Embedded migration scripts, keyed by file name.
const MIGRATION_FILES: &[(&str, &str)] = &[
    (
        "0001_initial_schema.sql",
        include_str!("migrations/0001_initial_schema.sql"),
    ),
    (
        "0002_add_task_completed_at.sql",
        include_str!("migrations/0002_add_task_completed_at.sql"),
    ),
    (
        "0003_add_project_completion.sql",
        include_str!("migrations/0003_add_project_completion.sql"),
    ),
    (
        "0004_add_task_notes.sql",
        include_str!("migrations/0004_add_task_notes.sql"),
    ),
];

/// Columns whose presence proves a legacy database already reached a version.
const LEGACY_MARKERS: &[(u32, &[(&str, &str)])] = &[
    (2, &[("tasks", "completed_at")]),
    (3, &[("projects", "completed"), ("projects", "completed_at")]),
    (4, &[("tasks", "notes")]),
];

/// Version assumed for any legacy database that has the core tables.
const LEGACY_BASE_VERSION: u32 = 1;

const INSERT_LEDGER_ROW: &str =
    "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub sql: String,
}

/// One row of the `schema_migrations` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub name: String,
    pub applied_at: String,
}

/// Migrations shipped with this crate, in ascending version order.
pub fn embedded_migrations() -> std::result::Result<Vec<Migration>, MigrationError> {
    load_migrations(MIGRATION_FILES)
}

/// Builds migrations from `(filename, script)` pairs.
///
/// Files without a `.sql` extension are ignored. The result is sorted by
/// version no matter what order the files were listed in.
pub fn load_migrations(
    files: &[(&str, &str)],
) -> std::result::Result<Vec<Migration>, MigrationError> {
    let mut migrations = Vec::with_capacity(files.len());
    for (filename, sql) in files {
        if !filename.ends_with(".sql") {
            continue;
        }
        let (version, name) = parse_migration_filename(filename)?;
        migrations.push(Migration {
            version,
            name,
            sql: sql.to_string(),
        });
    }
    sort_unique(migrations)
}

/// Splits `0003_add_project_completion.sql` into `(3, "add_project_completion")`.
pub fn parse_migration_filename(
    filename: &str,
) -> std::result::Result<(u32, String), MigrationError> {
    let base = filename.strip_suffix(".sql").unwrap_or(filename);
    let (version, name) = base
        .split_once('_')
        .filter(|(_, name)| !name.is_empty())
        .ok_or_else(|| MigrationError::InvalidFilename(filename.to_string()))?;

    let version = version
        .parse::<u32>()
        .map_err(|source| MigrationError::InvalidVersion {
            filename: filename.to_string(),
            source,
        })?;

    Ok((version, name.to_string()))
}

fn sort_unique(
    mut migrations: Vec<Migration>,
) -> std::result::Result<Vec<Migration>, MigrationError> {
    migrations.sort_by_key(|m| m.version);
    if let Some(pair) = migrations
        .windows(2)
        .find(|pair| pair[0].version == pair[1].version)
    {
        return Err(MigrationError::DuplicateVersion(pair[0].version));
    }
    Ok(migrations)
}

/// Brings the schema up to date with the embedded migrations.
///
/// Returns how many migrations were applied.
pub async fn run_migrations(conn: &mut Connection) -> Result<usize> {
    let migrations = embedded_migrations()?;
    run_migration_set(conn, migrations).await
}

/// Applies every migration in `migrations` not yet in the ledger, lowest
/// version first, each in its own transaction.
pub async fn run_migration_set(conn: &mut Connection, migrations: Vec<Migration>) -> Result<usize> {
    let migrations = sort_unique(migrations)?;

    ensure_ledger(conn).await?;
    bootstrap_legacy(conn, &migrations).await?;

    let applied = applied_versions(conn).await?;
    let mut count = 0;
    for migration in migrations.iter().filter(|m| !applied.contains(&m.version)) {
        apply_migration(conn, migration).await?;
        count += 1;
    }

    debug!(applied = count, "migrations up to date");
    Ok(count)
}

/// Ledger rows in version order.
pub async fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let read_err = |source: turso::Error| MigrationError::Ledger {
        action: "read",
        source,
    };

    let mut rows = conn
        .query(
            "SELECT version, name, applied_at FROM schema_migrations ORDER BY version ASC",
            params![],
        )
        .await
        .map_err(read_err)?;

    let mut applied = Vec::new();
    while let Some(row) = rows.next().await.map_err(read_err)? {
        let version: i64 = row.get(0).map_err(read_err)?;
        let version =
            u32::try_from(version).map_err(|_| MigrationError::InvalidLedgerVersion(version))?;
        applied.push(AppliedMigration {
            version,
            name: row.get(1).map_err(read_err)?,
            applied_at: row
                .get::<Option<String>>(2)
                .map_err(read_err)?
                .unwrap_or_default(),
        });
    }

    Ok(applied)
}

async fn ensure_ledger(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )"#,
        params![],
    )
    .await
    .map_err(|source| MigrationError::Ledger {
        action: "create",
        source,
    })?;

    Ok(())
}

async fn applied_versions(conn: &Connection) -> Result<HashSet<u32>> {
    Ok(applied_migrations(conn)
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect())
}

async fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let apply_err = |source: turso::Error| MigrationError::Apply {
        version: migration.version,
        name: migration.name.clone(),
        source,
    };

    let tx = conn.transaction().await.map_err(apply_err)?;

    for statement in split_statements(&migration.sql) {
        tx.execute(&statement, params![]).await.map_err(apply_err)?;
    }

    tx.execute(
        INSERT_LEDGER_ROW,
        params![
            i64::from(migration.version),
            migration.name.clone(),
            dates::format_timestamp(Utc::now())
        ],
    )
    .await
    .map_err(|source| MigrationError::Ledger {
        action: "record",
        source,
    })?;

    tx.commit().await.map_err(apply_err)?;

    info!(
        version = migration.version,
        name = %migration.name,
        "applied migration"
    );
    Ok(())
}

/// Marks migrations as applied on a database that predates the ledger.
///
/// Runs only when the ledger is empty and the core tables already exist.
/// Scripts are not executed; the rows are written in one transaction.
async fn bootstrap_legacy(conn: &mut Connection, migrations: &[Migration]) -> Result<()> {
    if !applied_versions(conn).await?.is_empty() {
        return Ok(());
    }

    let has_projects = table_exists(conn, "projects").await?;
    let has_tasks = table_exists(conn, "tasks").await?;
    if !has_projects && !has_tasks {
        return Ok(());
    }

    let present = legacy_versions(conn).await?;

    let tx = conn
        .transaction()
        .await
        .map_err(MigrationError::Bootstrap)?;
    let applied_at = dates::format_timestamp(Utc::now());

    let mut recorded = Vec::new();
    for migration in migrations.iter().filter(|m| present.contains(&m.version)) {
        tx.execute(
            INSERT_LEDGER_ROW,
            params![
                i64::from(migration.version),
                migration.name.clone(),
                applied_at.clone()
            ],
        )
        .await
        .map_err(MigrationError::Bootstrap)?;
        recorded.push(migration.version);
    }

    tx.commit().await.map_err(MigrationError::Bootstrap)?;

    info!(?recorded, "bootstrapped legacy database into migration ledger");
    Ok(())
}

/// Versions a legacy database already carries: the base version plus every
/// version whose marker columns are all present.
///
/// Each version is judged on its own markers. A database with `tasks.notes`
/// but no `tasks.completed_at` gets 4 recorded and 2 left pending, so the
/// missing column is still added.
async fn legacy_versions(conn: &Connection) -> Result<HashSet<u32>> {
    let mut present = HashSet::from([LEGACY_BASE_VERSION]);
    for (version, columns) in LEGACY_MARKERS {
        let mut satisfied = true;
        for (table, column) in columns.iter() {
            if !column_exists(conn, table, column).await? {
                satisfied = false;
                break;
            }
        }
        if satisfied {
            present.insert(*version);
        }
    }
    Ok(present)
}

pub(crate) async fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![table],
        )
        .await
        .map_err(MigrationError::Bootstrap)?;

    Ok(rows
        .next()
        .await
        .map_err(MigrationError::Bootstrap)?
        .is_some())
}

/// `table` must be a trusted identifier; it is spliced into the PRAGMA.
pub(crate) async fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut rows = conn
        .query(&format!("PRAGMA table_info({})", table), params![])
        .await
        .map_err(MigrationError::Bootstrap)?;

    while let Some(row) = rows.next().await.map_err(MigrationError::Bootstrap)? {
        let name: String = row.get(1).map_err(MigrationError::Bootstrap)?;
        if name == column {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Splits a script into statements, dropping `--` comment lines.
fn split_statements(sql: &str) -> Vec<String> {
    let uncommented: Vec<&str> = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect();

    uncommented
        .join("\n")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
