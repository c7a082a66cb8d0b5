//! Issue domain model
//!
//! Issues are the tracked units of work. They carry a closed set of types,
//! statuses and priorities, an optional parent (one level deep) and an
//! optional claim lease.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::id::{IdError, IssueId};
use super::lease::ClaimLease;

/// Input that failed the issue domain rules
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required")]
    EmptyTitle,

    #[error("Invalid type '{0}': expected one of epic, task, bug, feature, chore, decision")]
    InvalidKind(String),

    #[error("Invalid status '{0}': expected one of open, in_progress, closed")]
    InvalidStatus(String),

    #[error("Priority must be between 0 and 3, got '{0}'")]
    InvalidPriority(String),

    #[error("Unsupported field '{0}': expected one of title, description, type, status, priority, parent")]
    UnsupportedField(String),

    #[error("No updates provided")]
    NoUpdates,

    #[error("Issue {0} cannot depend on itself")]
    SelfDependency(IssueId),

    #[error("Issue {0} cannot be its own parent")]
    SelfParent(IssueId),

    #[error("Invalid claim TTL '{0}': expected a positive duration like 90, 30m, 1h or 1h30m")]
    InvalidTtl(String),

    #[error(transparent)]
    Id(#[from] IdError),
}

/// Type of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Epic,
    #[default]
    Task,
    Bug,
    Feature,
    Chore,
    Decision,
}

impl IssueKind {
    pub const ALL: [IssueKind; 6] = [
        IssueKind::Epic,
        IssueKind::Task,
        IssueKind::Bug,
        IssueKind::Feature,
        IssueKind::Chore,
        IssueKind::Decision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Epic => "epic",
            IssueKind::Task => "task",
            IssueKind::Bug => "bug",
            IssueKind::Feature => "feature",
            IssueKind::Chore => "chore",
            IssueKind::Decision => "decision",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidKind(s.to_string()))
    }
}

/// Status of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 3] = [
        IssueStatus::Open,
        IssueStatus::InProgress,
        IssueStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Closed => "closed",
        }
    }

    /// Returns true if this status represents finished work
    pub fn is_closed(&self) -> bool {
        matches!(self, IssueStatus::Closed)
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidStatus(s.to_string()))
    }
}

/// Issue priority, 0 (highest) through 3 (lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const LOWEST: Priority = Priority(3);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (Self::HIGHEST.0 as i64..=Self::LOWEST.0 as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::InvalidPriority(value.to_string()))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(2)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix('P')
            .or_else(|| trimmed.strip_prefix('p'))
            .unwrap_or(trimmed);
        let value: i64 = trimmed
            .parse()
            .map_err(|_| ValidationError::InvalidPriority(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<i64> for Priority {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

/// A tracked work item as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Storage surrogate key, never shown to users
    #[serde(skip)]
    pub(crate) internal_id: i64,

    /// Public ID (`faz-ab12` or `faz-ab12.0`). Legacy rows may carry `legacy-{n}`.
    pub id: String,

    pub title: String,

    pub description: String,

    #[serde(rename = "type")]
    pub kind: IssueKind,

    pub priority: Priority,

    pub status: IssueStatus,

    /// Public ID of the parent issue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Active claim lease, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimLease>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Raw creation request, as received from a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub kind: String,
    /// Blank means `open`
    pub status: String,
    pub priority: i64,
    /// Parent public ID for a child issue
    pub parent: Option<String>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            kind: kind.into(),
            status: String::new(),
            priority: Priority::default().value() as i64,
            parent: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Checks every field against the domain rules
    pub fn validate(self) -> Result<IssueDraft, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let kind: IssueKind = self.kind.trim().parse()?;

        let status = self.status.trim();
        let status = if status.is_empty() {
            IssueStatus::Open
        } else {
            status.parse()?
        };

        let priority = Priority::new(self.priority)?;

        let parent = match self.parent.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(IssueId::parse(raw)?),
            _ => None,
        };

        Ok(IssueDraft {
            title,
            description: self.description,
            kind,
            status,
            priority,
            parent,
        })
    }
}

/// Validated creation request, waiting for an ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub kind: IssueKind,
    pub status: IssueStatus,
    pub priority: Priority,
    pub parent: Option<IssueId>,
}
