//! SQLite issue store
//!
//! The store lives in `.faz/faz.db`. Every invariant that has to hold across
//! concurrent invocations is enforced by the schema: a unique public ID,
//! foreign keys for parents and dependency edges, and a CHECK against
//! self-dependencies. Reads join each issue to its parent so callers always
//! see public IDs, never storage keys.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Params, Row, ToSql};
use thiserror::Error;
use tracing::debug;

use super::schema;
use crate::domain::{
    format_ttl, ClaimLease, FieldChanges, Issue, IssueDraft, IssueId, IssueKind, IssueStatus, ListFilter,
    ParentChange, Priority,
};

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

const ISSUE_SELECT: &str = "SELECT i.id, i.public_id, i.title, i.description, i.type, i.priority, \
     i.status, p.public_id, i.claimed_at, i.claim_expires_at, i.created_at, i.updated_at, \
     i.closed_at";

const ORDER_BY_PRIORITY: &str = "ORDER BY i.priority ASC, i.id ASC";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Issue {0} not found")]
    NotFound(String),

    #[error("Issue {issue} or blocker {depends_on} not found")]
    DependencyEndpointsNotFound { issue: String, depends_on: String },

    #[error("Dependency from {issue} to {depends_on} not found")]
    DependencyNotFound { issue: String, depends_on: String },

    #[error("Issue {0} is already claimed")]
    AlreadyClaimed(String),

    #[error("Claim lease of {0} ends past the supported timestamp range")]
    LeaseOutOfRange(String),

    #[error("Cannot add dependency: {depends_on} already depends on {issue}")]
    DirectCycle { issue: String, depends_on: String },

    #[error("Failed to {context}: constraint violation: {message}")]
    Constraint {
        context: &'static str,
        message: String,
    },

    #[error("Failed to {context}")]
    Sqlite {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    /// Returns true for every "does not exist" flavour
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::DependencyEndpointsNotFound { .. }
                | StoreError::DependencyNotFound { .. }
        )
    }
}

/// Attaches an operation name to rusqlite results
pub(super) trait SqlContext<T> {
    fn sql_context(self, context: &'static str) -> Result<T, StoreError>;
}

impl<T> SqlContext<T> for rusqlite::Result<T> {
    fn sql_context(self, context: &'static str) -> Result<T, StoreError> {
        self.map_err(|err| match err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint {
                    context,
                    message: message.unwrap_or_else(|| failure.to_string()),
                }
            }
            source => StoreError::Sqlite { context, source },
        })
    }
}

impl ToSql for IssueKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for IssueKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for IssueStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for IssueStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.value())))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Priority::new(value.as_i64()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Current time at the precision timestamps are stored with
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and SQLite's `CURRENT_TIMESTAMP` form
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ts| ts.and_utc()))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        parse_timestamp(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn required_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    timestamp_column(row, idx)?.ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "timestamp".to_string(),
        Type::Null,
    ))
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        internal_id: row.get(0)?,
        id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        kind: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        parent_id: row.get(7)?,
        claim: ClaimLease::from_columns(timestamp_column(row, 8)?, timestamp_column(row, 9)?),
        created_at: required_timestamp(row, 10)?,
        updated_at: required_timestamp(row, 11)?,
        closed_at: timestamp_column(row, 12)?,
    })
}

/// Issue persistence and one-hop graph queries
pub struct IssueStore {
    conn: Connection,
}

impl IssueStore {
    /// Opens (creating if needed) the database file and brings its schema up to date
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).sql_context("open database")?;
        Self::from_connection(conn)
    }

    /// Private database that disappears with the store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().sql_context("open database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .sql_context("set busy timeout")?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
        )
        .sql_context("configure connection")?;

        schema::migrate(&conn)?;

        Ok(Self { conn })
    }

    fn query_issues<P: Params>(
        &self,
        context: &'static str,
        sql: &str,
        params: P,
    ) -> Result<Vec<Issue>, StoreError> {
        let mut stmt = self.conn.prepare(sql).sql_context(context)?;
        let issues = stmt
            .query_map(params, issue_from_row)
            .sql_context(context)?
            .collect::<Result<Vec<_>, _>>()
            .sql_context(context)?;
        Ok(issues)
    }

    /// Resolves a public ID to its storage key
    fn internal_key(&self, id: &IssueId) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT id FROM issues WHERE public_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .sql_context("resolve issue")?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Inserts a new issue under a pre-allocated public ID
    pub fn create_issue(&self, id: &IssueId, draft: &IssueDraft) -> Result<String, StoreError> {
        let parent_key = draft
            .parent
            .as_ref()
            .map(|parent| self.internal_key(parent))
            .transpose()?;

        let now = format_timestamp(now());
        let closed_at = draft.status.is_closed().then(|| now.clone());

        self.conn
            .execute(
                "INSERT INTO issues (public_id, title, description, type, priority, status,
                                     parent_id, created_at, updated_at, closed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)",
                params![
                    id.as_str(),
                    draft.title,
                    draft.description,
                    draft.kind,
                    draft.priority,
                    draft.status,
                    parent_key,
                    now,
                    closed_at,
                ],
            )
            .sql_context("insert issue")?;

        debug!(id = %id, kind = %draft.kind, "inserted issue");
        Ok(id.to_string())
    }

    pub fn get_issue(&self, id: &IssueId) -> Result<Issue, StoreError> {
        let sql = format!(
            "{ISSUE_SELECT} FROM issues i LEFT JOIN issues p ON p.id = i.parent_id
             WHERE i.public_id = ?1"
        );
        self.conn
            .query_row(&sql, params![id.as_str()], issue_from_row)
            .optional()
            .sql_context("query issue")?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn public_id_exists(&self, id: &IssueId) -> Result<bool, StoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM issues WHERE public_id = ?1)",
                params![id.as_str()],
                |row| row.get(0),
            )
            .sql_context("check public ID")
    }

    /// Index for the next child of `parent`: its current number of direct children
    pub fn next_child_index(&self, parent: &IssueId) -> Result<u32, StoreError> {
        let parent_key = self.internal_key(parent)?;
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM issues WHERE parent_id = ?1",
                params![parent_key],
                |row| row.get(0),
            )
            .sql_context("count child issues")?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Direct children; empty if the parent does not exist
    pub fn list_children(&self, parent: &IssueId) -> Result<Vec<Issue>, StoreError> {
        let sql = format!(
            "{ISSUE_SELECT} FROM issues i JOIN issues p ON p.id = i.parent_id
             WHERE p.public_id = ?1 {ORDER_BY_PRIORITY}"
        );
        self.query_issues("query child issues", &sql, params![parent.as_str()])
    }

    /// Issues that `id` depends on
    pub fn list_dependencies(&self, id: &IssueId) -> Result<Vec<Issue>, StoreError> {
        let sql = format!(
            "{ISSUE_SELECT} FROM dependencies d
             JOIN issues source ON source.id = d.issue_id
             JOIN issues i ON i.id = d.depends_on_id
             LEFT JOIN issues p ON p.id = i.parent_id
             WHERE source.public_id = ?1 {ORDER_BY_PRIORITY}"
        );
        self.query_issues("query dependencies", &sql, params![id.as_str()])
    }

    /// Issues that depend on `id`
    pub fn list_dependents(&self, id: &IssueId) -> Result<Vec<Issue>, StoreError> {
        let sql = format!(
            "{ISSUE_SELECT} FROM dependencies d
             JOIN issues target ON target.id = d.depends_on_id
             JOIN issues i ON i.id = d.issue_id
             LEFT JOIN issues p ON p.id = i.parent_id
             WHERE target.public_id = ?1 {ORDER_BY_PRIORITY}"
        );
        self.query_issues("query dependents", &sql, params![id.as_str()])
    }

    pub fn list_issues(&self, filter: &ListFilter) -> Result<Vec<Issue>, StoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(kind) = filter.kind {
            clauses.push("i.type = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        match filter.status {
            Some(status) => {
                clauses.push("i.status = ?");
                values.push(Value::Text(status.as_str().to_string()));
            }
            None if filter.hides_closed() => clauses.push("i.status != 'closed'"),
            None => {}
        }
        if let Some(priority) = filter.priority {
            clauses.push("i.priority = ?");
            values.push(Value::Integer(i64::from(priority.value())));
        }
        if let Some(parent) = &filter.parent {
            clauses.push("p.public_id = ?");
            values.push(Value::Text(parent.to_string()));
        }

        let mut sql = format!("{ISSUE_SELECT} FROM issues i LEFT JOIN issues p ON p.id = i.parent_id");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY i.priority ASC, i.created_at ASC, i.id ASC");

        self.query_issues("list issues", &sql, params_from_iter(values))
    }

    /// Hard delete; edges cascade and children lose their parent link
    pub fn delete_issue(&self, id: &IssueId) -> Result<(), StoreError> {
        let rows = self
            .conn
            .execute("DELETE FROM issues WHERE public_id = ?1", params![id.as_str()])
            .sql_context("delete issue")?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        debug!(id = %id, "deleted issue");
        Ok(())
    }

    /// Applies a validated partial update. An empty change set does nothing.
    pub fn update_fields(&self, id: &IssueId, changes: &FieldChanges) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &changes.title {
            sets.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(description) = &changes.description {
            sets.push("description = ?");
            values.push(Value::Text(description.clone()));
        }
        if let Some(kind) = changes.kind {
            sets.push("type = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(status) = changes.status {
            sets.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(priority) = changes.priority {
            sets.push("priority = ?");
            values.push(Value::Integer(i64::from(priority.value())));
        }
        match &changes.parent {
            Some(ParentChange::Set(parent)) => {
                sets.push("parent_id = ?");
                values.push(Value::Integer(self.internal_key(parent)?));
            }
            Some(ParentChange::Clear) => sets.push("parent_id = NULL"),
            None => {}
        }

        sets.push("updated_at = ?");
        values.push(Value::Text(format_timestamp(now())));
        values.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE issues SET {} WHERE public_id = ?", sets.join(", "));
        let rows = self
            .conn
            .execute(&sql, params_from_iter(values))
            .sql_context("update issue")?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        debug!(id = %id, fields = ?changes.fields(), "updated issue");
        Ok(())
    }

    /// Marks an issue closed and releases any claim on it
    pub fn close_issue(&self, id: &IssueId) -> Result<(), StoreError> {
        let rows = self
            .conn
            .execute(
                "UPDATE issues
                 SET status = 'closed', closed_at = ?1, updated_at = ?1,
                     claimed_at = NULL, claim_expires_at = NULL
                 WHERE public_id = ?2",
                params![format_timestamp(now()), id.as_str()],
            )
            .sql_context("close issue")?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        debug!(id = %id, "closed issue");
        Ok(())
    }

    /// Marks an issue open again, clearing `closed_at` and any claim
    pub fn reopen_issue(&self, id: &IssueId) -> Result<(), StoreError> {
        let rows = self
            .conn
            .execute(
                "UPDATE issues
                 SET status = 'open', closed_at = NULL, updated_at = ?1,
                     claimed_at = NULL, claim_expires_at = NULL
                 WHERE public_id = ?2",
                params![format_timestamp(now()), id.as_str()],
            )
            .sql_context("reopen issue")?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        debug!(id = %id, "reopened issue");
        Ok(())
    }

    /// Takes the claim lease on an unclaimed issue and moves it to in_progress
    ///
    /// The check and the write are one conditional UPDATE, so of two racing
    /// claimers exactly one sees a changed row.
    pub fn claim_issue(&self, id: &IssueId, ttl: Duration) -> Result<ClaimLease, StoreError> {
        let lease = ClaimLease::starting_at(now(), ttl)
            .ok_or_else(|| StoreError::LeaseOutOfRange(format_ttl(ttl)))?;
        let claimed_at = format_timestamp(lease.claimed_at);

        let rows = self
            .conn
            .execute(
                "UPDATE issues
                 SET status = 'in_progress', claimed_at = ?1, claim_expires_at = ?2,
                     updated_at = ?1
                 WHERE public_id = ?3 AND claimed_at IS NULL",
                params![claimed_at, format_timestamp(lease.expires_at), id.as_str()],
            )
            .sql_context("claim issue")?;

        if rows == 0 {
            return Err(if self.public_id_exists(id)? {
                StoreError::AlreadyClaimed(id.to_string())
            } else {
                StoreError::NotFound(id.to_string())
            });
        }

        debug!(id = %id, expires_at = %lease.expires_at, "claimed issue");
        Ok(lease)
    }

    fn has_dependency(&self, issue: &IssueId, depends_on: &IssueId) -> Result<bool, StoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM dependencies d
                     JOIN issues source ON source.id = d.issue_id
                     JOIN issues target ON target.id = d.depends_on_id
                     WHERE source.public_id = ?1 AND target.public_id = ?2
                 )",
                params![issue.as_str(), depends_on.as_str()],
                |row| row.get(0),
            )
            .sql_context("check dependency")
    }

    /// Records that `issue` depends on `depends_on`
    pub fn add_dependency(&self, issue: &IssueId, depends_on: &IssueId) -> Result<(), StoreError> {
        if self.has_dependency(depends_on, issue)? {
            return Err(StoreError::DirectCycle {
                issue: issue.to_string(),
                depends_on: depends_on.to_string(),
            });
        }

        let rows = self
            .conn
            .execute(
                "INSERT INTO dependencies (issue_id, depends_on_id)
                 SELECT source.id, target.id
                 FROM issues source, issues target
                 WHERE source.public_id = ?1 AND target.public_id = ?2",
                params![issue.as_str(), depends_on.as_str()],
            )
            .sql_context("add dependency")?;
        if rows == 0 {
            return Err(StoreError::DependencyEndpointsNotFound {
                issue: issue.to_string(),
                depends_on: depends_on.to_string(),
            });
        }

        debug!(issue = %issue, depends_on = %depends_on, "added dependency");
        Ok(())
    }

    pub fn remove_dependency(
        &self,
        issue: &IssueId,
        depends_on: &IssueId,
    ) -> Result<(), StoreError> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM dependencies
                 WHERE issue_id = (SELECT id FROM issues WHERE public_id = ?1)
                   AND depends_on_id = (SELECT id FROM issues WHERE public_id = ?2)",
                params![issue.as_str(), depends_on.as_str()],
            )
            .sql_context("remove dependency")?;
        if rows == 0 {
            return Err(StoreError::DependencyNotFound {
                issue: issue.to_string(),
                depends_on: depends_on.to_string(),
            });
        }

        debug!(issue = %issue, depends_on = %depends_on, "removed dependency");
        Ok(())
    }

    /// Unclosed, non-epic issues whose dependencies are all closed
    pub fn ready_issues(&self) -> Result<Vec<Issue>, StoreError> {
        let sql = format!(
            "{ISSUE_SELECT} FROM issues i LEFT JOIN issues p ON p.id = i.parent_id
             WHERE i.status != 'closed'
               AND i.type != 'epic'
               AND NOT EXISTS (
                   SELECT 1 FROM dependencies d
                   JOIN issues b ON b.id = d.depends_on_id
                   WHERE d.issue_id = i.id AND b.status != 'closed'
               )
             {ORDER_BY_PRIORITY}"
        );
        self.query_issues("query ready issues", &sql, [])
    }

    pub fn open_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM issues WHERE status != 'closed'",
                [],
                |row| row.get(0),
            )
            .sql_context("count open issues")?;
        Ok(count.max(0) as u64)
    }

    /// Most recently closed issues, newest first
    pub fn recent_completed(&self, limit: usize) -> Result<Vec<Issue>, StoreError> {
        let sql = format!(
            "{ISSUE_SELECT} FROM issues i LEFT JOIN issues p ON p.id = i.parent_id
             WHERE i.status = 'closed'
             ORDER BY i.closed_at DESC, i.id DESC
             LIMIT ?1"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_issues("query recently closed issues", &sql, params![limit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssuePatch, NewIssue};
    use tempfile::TempDir;

    fn id(raw: &str) -> IssueId {
        IssueId::parse(raw).unwrap()
    }

    fn insert(store: &IssueStore, raw_id: &str, title: &str) -> IssueId {
        insert_draft(store, raw_id, NewIssue::new(title, "task"))
    }

    fn insert_draft(store: &IssueStore, raw_id: &str, new: NewIssue) -> IssueId {
        let issue_id = id(raw_id);
        store
            .create_issue(&issue_id, &new.validate().unwrap())
            .unwrap();
        issue_id
    }

    fn ids(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.id.as_str()).collect()
    }

    #[test]
    fn open_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faz.db");

        let store = IssueStore::open(&path).unwrap();
        insert(&store, "faz-aaaa", "Persisted");
        drop(store);

        let reopened = IssueStore::open(&path).unwrap();
        assert_eq!(reopened.get_issue(&id("faz-aaaa")).unwrap().title, "Persisted");
    }

    #[test]
    fn create_and_get() {
        let store = IssueStore::open_in_memory().unwrap();
        let new = NewIssue::new("Fix login", "bug")
            .with_description("SSO fails")
            .with_priority(1);
        insert_draft(&store, "faz-ab12", new);

        let issue = store.get_issue(&id("faz-ab12")).unwrap();
        assert_eq!(issue.id, "faz-ab12");
        assert_eq!(issue.title, "Fix login");
        assert_eq!(issue.description, "SSO fails");
        assert_eq!(issue.kind, IssueKind::Bug);
        assert_eq!(issue.priority.value(), 1);
        assert_eq!(issue.status, IssueStatus::Open);
        assert!(issue.parent_id.is_none());
        assert!(issue.claim.is_none());
        assert!(issue.closed_at.is_none());
        assert_eq!(issue.created_at, issue.updated_at);
    }

    #[test]
    fn get_missing_issue() {
        let store = IssueStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get_issue(&id("faz-zzzz")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_public_id_is_a_constraint_violation() {
        let store = IssueStore::open_in_memory().unwrap();
        insert(&store, "faz-aaaa", "First");

        let draft = NewIssue::new("Second", "task").validate().unwrap();
        let err = store.create_issue(&id("faz-aaaa"), &draft).unwrap_err();
        assert!(matches!(err, StoreError::Constraint { context: "insert issue", .. }));
    }

    #[test]
    fn create_child_requires_existing_parent() {
        let store = IssueStore::open_in_memory().unwrap();
        let draft = NewIssue::new("Orphan", "task")
            .with_parent("faz-nope")
            .validate()
            .unwrap();

        assert!(matches!(
            store.create_issue(&id("faz-nope.0"), &draft),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn children_and_child_index() {
        let store = IssueStore::open_in_memory().unwrap();
        let parent = insert(&store, "faz-aaaa", "Epic");
        assert_eq!(store.next_child_index(&parent).unwrap(), 0);

        insert_draft(
            &store,
            "faz-aaaa.0",
            NewIssue::new("Low", "task").with_priority(3).with_parent("faz-aaaa"),
        );
        insert_draft(
            &store,
            "faz-aaaa.1",
            NewIssue::new("High", "task").with_priority(0).with_parent("faz-aaaa"),
        );

        assert_eq!(store.next_child_index(&parent).unwrap(), 2);
        let children = store.list_children(&parent).unwrap();
        assert_eq!(ids(&children), vec!["faz-aaaa.1", "faz-aaaa.0"]);
        assert_eq!(children[0].parent_id.as_deref(), Some("faz-aaaa"));

        assert!(store.list_children(&id("faz-none")).unwrap().is_empty());
        assert!(matches!(
            store.next_child_index(&id("faz-none")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_filters_and_hides_closed() {
        let store = IssueStore::open_in_memory().unwrap();
        let a = insert(&store, "faz-aaaa", "A");
        insert_draft(&store, "faz-bbbb", NewIssue::new("B", "bug").with_priority(0));
        insert(&store, "faz-cccc", "C");
        store.close_issue(&a).unwrap();

        let open = store.list_issues(&ListFilter::default()).unwrap();
        assert_eq!(ids(&open), vec!["faz-bbbb", "faz-cccc"]);

        let all = store
            .list_issues(&ListFilter {
                all: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.len(), 3);

        let closed = store
            .list_issues(&ListFilter {
                status: Some(IssueStatus::Closed),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ids(&closed), vec!["faz-aaaa"]);

        let bugs = store
            .list_issues(&ListFilter {
                kind: Some(IssueKind::Bug),
                priority: Some(Priority::HIGHEST),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ids(&bugs), vec!["faz-bbbb"]);
    }

    #[test]
    fn list_by_parent() {
        let store = IssueStore::open_in_memory().unwrap();
        insert(&store, "faz-aaaa", "Parent");
        insert(&store, "faz-bbbb", "Unrelated");
        insert_draft(
            &store,
            "faz-aaaa.0",
            NewIssue::new("Child", "task").with_parent("faz-aaaa"),
        );

        let children = store
            .list_issues(&ListFilter {
                parent: Some(id("faz-aaaa")),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ids(&children), vec!["faz-aaaa.0"]);
    }

    #[test]
    fn update_fields_partially() {
        let store = IssueStore::open_in_memory().unwrap();
        let target = insert(&store, "faz-aaaa", "Old");
        insert(&store, "faz-bbbb", "Parent");
        let before = store.get_issue(&target).unwrap();

        let changes = IssuePatch::new()
            .title("New")
            .priority(0)
            .parent("faz-bbbb")
            .validate(&target)
            .unwrap();
        store.update_fields(&target, &changes).unwrap();

        let after = store.get_issue(&target).unwrap();
        assert_eq!(after.title, "New");
        assert_eq!(after.priority, Priority::HIGHEST);
        assert_eq!(after.parent_id.as_deref(), Some("faz-bbbb"));
        assert_eq!(after.description, before.description);
        assert!(after.updated_at >= before.updated_at);

        let clear = IssuePatch::new().clear_parent().validate(&target).unwrap();
        store.update_fields(&target, &clear).unwrap();
        assert!(store.get_issue(&target).unwrap().parent_id.is_none());
    }

    #[test]
    fn update_fields_errors() {
        let store = IssueStore::open_in_memory().unwrap();
        let target = insert(&store, "faz-aaaa", "Target");

        let missing_parent = IssuePatch::new().parent("faz-zzzz").validate(&target).unwrap();
        assert!(matches!(
            store.update_fields(&target, &missing_parent),
            Err(StoreError::NotFound(ref missing)) if missing == "faz-zzzz"
        ));

        let ghost = id("faz-gggg");
        let title = IssuePatch::new().title("x").validate(&ghost).unwrap();
        assert!(matches!(
            store.update_fields(&ghost, &title),
            Err(StoreError::NotFound(_))
        ));

        store.update_fields(&ghost, &FieldChanges::default()).unwrap();
    }

    #[test]
    fn close_and_reopen() {
        let store = IssueStore::open_in_memory().unwrap();
        let target = insert(&store, "faz-aaaa", "Work");

        store.claim_issue(&target, Duration::hours(1)).unwrap();
        store.close_issue(&target).unwrap();

        let closed = store.get_issue(&target).unwrap();
        assert_eq!(closed.status, IssueStatus::Closed);
        assert!(closed.closed_at.is_some());
        assert!(closed.claim.is_none());

        store.reopen_issue(&target).unwrap();
        let reopened = store.get_issue(&target).unwrap();
        assert_eq!(reopened.status, IssueStatus::Open);
        assert!(reopened.closed_at.is_none());

        assert!(matches!(
            store.close_issue(&id("faz-zzzz")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.reopen_issue(&id("faz-zzzz")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn claim_is_single_holder() {
        let store = IssueStore::open_in_memory().unwrap();
        let target = insert(&store, "faz-aaaa", "Work");

        let lease = store.claim_issue(&target, Duration::minutes(30)).unwrap();
        assert_eq!(lease.ttl(), Duration::minutes(30));

        let claimed = store.get_issue(&target).unwrap();
        assert_eq!(claimed.status, IssueStatus::InProgress);
        assert_eq!(claimed.claim, Some(lease));

        assert!(matches!(
            store.claim_issue(&target, Duration::hours(1)),
            Err(StoreError::AlreadyClaimed(_))
        ));
        assert!(store
            .claim_issue(&id("faz-zzzz"), Duration::hours(1))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn claim_with_out_of_range_lease_leaves_issue_untouched() {
        let store = IssueStore::open_in_memory().unwrap();
        let target = insert(&store, "faz-aaaa", "Work");

        assert!(matches!(
            store.claim_issue(&target, Duration::MAX),
            Err(StoreError::LeaseOutOfRange(_))
        ));
        let issue = store.get_issue(&target).unwrap();
        assert_eq!(issue.status, IssueStatus::Open);
        assert!(issue.claim.is_none());
    }

    #[test]
    fn claim_is_available_again_after_reopen() {
        let store = IssueStore::open_in_memory().unwrap();
        let target = insert(&store, "faz-aaaa", "Work");

        store.claim_issue(&target, Duration::seconds(1)).unwrap();
        store.reopen_issue(&target).unwrap();
        store.claim_issue(&target, Duration::hours(1)).unwrap();
    }

    #[test]
    fn dependencies_one_hop() {
        let store = IssueStore::open_in_memory().unwrap();
        let a = insert(&store, "faz-aaaa", "A");
        let b = insert(&store, "faz-bbbb", "B");
        let c = insert(&store, "faz-cccc", "C");

        store.add_dependency(&b, &a).unwrap();
        store.add_dependency(&c, &b).unwrap();

        assert_eq!(ids(&store.list_dependencies(&b).unwrap()), vec!["faz-aaaa"]);
        assert_eq!(ids(&store.list_dependents(&b).unwrap()), vec!["faz-cccc"]);
        assert!(store.list_dependencies(&a).unwrap().is_empty());
        assert!(store.list_dependents(&id("faz-none")).unwrap().is_empty());
    }

    #[test]
    fn dependency_errors() {
        let store = IssueStore::open_in_memory().unwrap();
        let a = insert(&store, "faz-aaaa", "A");
        let b = insert(&store, "faz-bbbb", "B");

        store.add_dependency(&b, &a).unwrap();

        assert!(matches!(
            store.add_dependency(&b, &a),
            Err(StoreError::Constraint { .. })
        ));
        assert!(matches!(
            store.add_dependency(&a, &b),
            Err(StoreError::DirectCycle { .. })
        ));
        assert!(matches!(
            store.add_dependency(&a, &a),
            Err(StoreError::Constraint { .. })
        ));
        assert!(matches!(
            store.add_dependency(&a, &id("faz-zzzz")),
            Err(StoreError::DependencyEndpointsNotFound { .. })
        ));
        assert!(matches!(
            store.remove_dependency(&a, &b),
            Err(StoreError::DependencyNotFound { .. })
        ));

        store.remove_dependency(&b, &a).unwrap();
        assert!(store.list_dependencies(&b).unwrap().is_empty());
    }

    #[test]
    fn ready_respects_blockers_and_epics() {
        let store = IssueStore::open_in_memory().unwrap();
        let a = insert(&store, "faz-aaaa", "A");
        let b = insert(&store, "faz-bbbb", "B");
        insert(&store, "faz-cccc", "C");
        insert_draft(&store, "faz-eeee", NewIssue::new("Epic", "epic"));

        store.add_dependency(&b, &a).unwrap();
        assert_eq!(ids(&store.ready_issues().unwrap()), vec!["faz-aaaa", "faz-cccc"]);

        store.close_issue(&a).unwrap();
        assert_eq!(ids(&store.ready_issues().unwrap()), vec!["faz-bbbb", "faz-cccc"]);
    }

    #[test]
    fn delete_cascades_edges_and_orphans_children() {
        let store = IssueStore::open_in_memory().unwrap();
        let parent = insert(&store, "faz-aaaa", "Parent");
        let child = insert_draft(
            &store,
            "faz-aaaa.0",
            NewIssue::new("Child", "task").with_parent("faz-aaaa"),
        );
        let other = insert(&store, "faz-bbbb", "Other");
        store.add_dependency(&other, &parent).unwrap();

        store.delete_issue(&parent).unwrap();

        let orphan = store.get_issue(&child).unwrap();
        assert!(orphan.parent_id.is_none());
        assert!(store.list_dependencies(&other).unwrap().is_empty());
        assert!(matches!(
            store.delete_issue(&parent),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn counts_and_recent_completed() {
        let store = IssueStore::open_in_memory().unwrap();
        let a = insert(&store, "faz-aaaa", "A");
        let b = insert(&store, "faz-bbbb", "B");
        insert(&store, "faz-cccc", "C");

        store.close_issue(&a).unwrap();
        store.close_issue(&b).unwrap();

        assert_eq!(store.open_count().unwrap(), 1);

        let recent = store.recent_completed(5).unwrap();
        assert_eq!(ids(&recent), vec!["faz-bbbb", "faz-aaaa"]);
        assert_eq!(store.recent_completed(1).unwrap().len(), 1);
    }

    #[test]
    fn created_closed_issue_is_stamped() {
        let store = IssueStore::open_in_memory().unwrap();
        let target = insert_draft(
            &store,
            "faz-aaaa",
            NewIssue::new("Done already", "task").with_status("closed"),
        );

        assert!(store.get_issue(&target).unwrap().closed_at.is_some());
    }

    #[test]
    fn timestamps_accept_sqlite_default_format() {
        let ts = parse_timestamp("2024-03-01 12:30:00").unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-01T12:30:00.000000Z");
        assert!(parse_timestamp("yesterday").is_err());
    }
}
