//! List filters

use super::id::IssueId;
use super::issue::{IssueKind, IssueStatus, Priority, ValidationError};

/// Raw list request; empty strings mean "no filter"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i64>,
    pub parent: Option<String>,
    /// Include closed issues when no status filter is given
    pub all: bool,
}

impl ListRequest {
    pub fn validate(self) -> Result<ListFilter, ValidationError> {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let kind = present(self.kind)
            .map(|kind| kind.parse::<IssueKind>())
            .transpose()?;
        let status = present(self.status)
            .map(|status| status.parse::<IssueStatus>())
            .transpose()?;
        let priority = self.priority.map(Priority::new).transpose()?;
        let parent = present(self.parent)
            .map(|parent| IssueId::parse(&parent))
            .transpose()?;

        Ok(ListFilter {
            kind,
            status,
            priority,
            parent,
            all: self.all,
        })
    }
}

/// Validated list filter; every present field narrows the result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub kind: Option<IssueKind>,
    pub status: Option<IssueStatus>,
    pub priority: Option<Priority>,
    pub parent: Option<IssueId>,
    pub all: bool,
}

impl ListFilter {
    /// Returns true if closed issues are dropped from the result
    pub fn hides_closed(&self) -> bool {
        self.status.is_none() && !self.all
    }
}
