//! Schema setup and repair
//!
//! Runs on every open. Each step is idempotent and only ever adds: tables
//! and indexes are created if missing, columns introduced after the first
//! release are added to older databases, and rows from before public IDs
//! existed get a `legacy-{n}` placeholder.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::{info, warn};

use super::store::{SqlContext, StoreError};

/// Recorded in `PRAGMA user_version` once the schema is current
pub const SCHEMA_VERSION: i32 = 1;

const BASE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS issues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        public_id TEXT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        type TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 2,
        status TEXT NOT NULL DEFAULT 'open',
        claimed_at TEXT,
        claim_expires_at TEXT,
        parent_id INTEGER,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        closed_at TEXT,
        FOREIGN KEY (parent_id) REFERENCES issues(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS dependencies (
        issue_id INTEGER NOT NULL,
        depends_on_id INTEGER NOT NULL,
        PRIMARY KEY (issue_id, depends_on_id),
        FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE,
        FOREIGN KEY (depends_on_id) REFERENCES issues(id) ON DELETE CASCADE,
        CHECK (issue_id != depends_on_id)
    );

    CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
    CREATE INDEX IF NOT EXISTS idx_issues_parent ON issues(parent_id);
    CREATE INDEX IF NOT EXISTS idx_issues_closed_at ON issues(closed_at);
    CREATE INDEX IF NOT EXISTS idx_dependencies_depends_on ON dependencies(depends_on_id);
";

/// Columns older databases may lack, with their declarations
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("public_id", "TEXT"),
    ("claimed_at", "TEXT"),
    ("claim_expires_at", "TEXT"),
];

const LATE_INDEXES: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_issues_public_id_unique ON issues(public_id);
    CREATE INDEX IF NOT EXISTS idx_issues_claim_expires_at ON issues(claim_expires_at);
";

/// Brings the schema up to date
pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(BASE_SCHEMA)
        .sql_context("create schema")?;

    let existing = column_names(conn, "issues")?;
    for (column, declaration) in ADDED_COLUMNS {
        if !existing.contains(*column) {
            conn.execute(
                &format!("ALTER TABLE issues ADD COLUMN {} {}", column, declaration),
                [],
            )
            .sql_context("add missing column")?;
            info!(column, "added missing issues column");
        }
    }

    conn.execute_batch(LATE_INDEXES)
        .sql_context("create indexes")?;

    let backfilled = conn
        .execute(
            "UPDATE issues SET public_id = 'legacy-' || id
             WHERE public_id IS NULL OR public_id = ''",
            [],
        )
        .sql_context("backfill public IDs")?;
    if backfilled > 0 {
        warn!(count = backfilled, "assigned legacy public IDs to issues without one");
    }

    if schema_version(conn)? < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .sql_context("record schema version")?;
    }

    Ok(())
}

/// Gets the value of `PRAGMA user_version`
pub fn schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .sql_context("read schema version")
}

fn column_names(conn: &Connection, table: &str) -> Result<HashSet<String>, StoreError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .sql_context("inspect table columns")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .sql_context("inspect table columns")?
        .collect::<Result<HashSet<_>, _>>()
        .sql_context("inspect table columns")?;
    Ok(names)
}
