//! Partial updates
//!
//! An [`IssuePatch`] holds one optional slot per mutable field, still in raw
//! caller form. [`IssuePatch::validate`] turns it into [`FieldChanges`], the
//! typed set of column updates the store applies.

use std::fmt;
use std::str::FromStr;

use super::id::{IdError, IssueId};
use super::issue::{IssueKind, IssueStatus, Priority, ValidationError};

/// Mutable issue fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Kind,
    Status,
    Priority,
    Parent,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::Description,
        Field::Kind,
        Field::Status,
        Field::Priority,
        Field::Parent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Kind => "type",
            Field::Status => "status",
            Field::Priority => "priority",
            Field::Parent => "parent",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == name)
            .ok_or_else(|| ValidationError::UnsupportedField(s.to_string()))
    }
}

/// New value for the parent link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentChange<P = IssueId> {
    Set(P),
    Clear,
}

/// Requested changes, unvalidated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i64>,
    pub parent: Option<ParentChange<String>>,
}

impl IssuePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(ParentChange::Set(parent.into()));
        self
    }

    pub fn clear_parent(mut self) -> Self {
        self.parent = Some(ParentChange::Clear);
        self
    }

    /// Sets a field from a `name=value` style pair
    ///
    /// An empty parent value clears the parent link.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ValidationError> {
        match name.parse::<Field>()? {
            Field::Title => self.title = Some(value.to_string()),
            Field::Description => self.description = Some(value.to_string()),
            Field::Kind => self.kind = Some(value.to_string()),
            Field::Status => self.status = Some(value.to_string()),
            Field::Priority => {
                let priority = value
                    .trim()
                    .parse()
                    .map_err(|_| ValidationError::InvalidPriority(value.to_string()))?;
                self.priority = Some(priority);
            }
            Field::Parent => {
                self.parent = Some(if value.trim().is_empty() {
                    ParentChange::Clear
                } else {
                    ParentChange::Set(value.to_string())
                });
            }
        }
        Ok(())
    }

    /// Validates every requested change for the issue `target`
    pub fn validate(self, target: &IssueId) -> Result<FieldChanges, ValidationError> {
        let IssuePatch {
            title,
            description,
            kind,
            status,
            priority,
            parent,
        } = self;

        let title = match title {
            Some(title) => {
                let title = title.trim();
                if title.is_empty() {
                    return Err(ValidationError::EmptyTitle);
                }
                Some(title.to_string())
            }
            None => None,
        };

        let kind = kind.map(|kind| kind.trim().parse::<IssueKind>()).transpose()?;
        let status = status
            .map(|status| status.trim().parse::<IssueStatus>())
            .transpose()?;
        let priority = priority.map(Priority::new).transpose()?;

        let parent = match parent {
            Some(ParentChange::Set(raw)) => {
                let parent = IssueId::parse(&raw)?;
                if parent.is_child() {
                    return Err(IdError::UnsupportedNesting(parent.to_string()).into());
                }
                if &parent == target {
                    return Err(ValidationError::SelfParent(parent));
                }
                Some(ParentChange::Set(parent))
            }
            Some(ParentChange::Clear) => Some(ParentChange::Clear),
            None => None,
        };

        let changes = FieldChanges {
            title,
            description,
            kind,
            status,
            priority,
            parent,
        };

        if changes.is_empty() {
            return Err(ValidationError::NoUpdates);
        }
        Ok(changes)
    }
}

/// Validated column updates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<IssueKind>,
    pub status: Option<IssueStatus>,
    pub priority: Option<Priority>,
    pub parent: Option<ParentChange>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Names of the fields this change set touches
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push(Field::Title);
        }
        if self.description.is_some() {
            fields.push(Field::Description);
        }
        if self.kind.is_some() {
            fields.push(Field::Kind);
        }
        if self.status.is_some() {
            fields.push(Field::Status);
        }
        if self.priority.is_some() {
            fields.push(Field::Priority);
        }
        if self.parent.is_some() {
            fields.push(Field::Parent);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> IssueId {
        IssueId::parse("faz-ab12").unwrap()
    }

    #[test]
    fn field_names() {
        assert_eq!("type".parse::<Field>().unwrap(), Field::Kind);
        assert_eq!(" Title ".parse::<Field>().unwrap(), Field::Title);
        assert_eq!(
            "assignee".parse::<Field>().unwrap_err(),
            ValidationError::UnsupportedField("assignee".to_string())
        );
    }

    #[test]
    fn empty_patch_has_no_updates() {
        assert_eq!(
            IssuePatch::new().validate(&target()).unwrap_err(),
            ValidationError::NoUpdates
        );
    }

    #[test]
    fn validate_trims_and_types_values() {
        let changes = IssuePatch::new()
            .title("  New title ")
            .kind(" feature")
            .status("in_progress")
            .priority(0)
            .validate(&target())
            .unwrap();

        assert_eq!(changes.title.as_deref(), Some("New title"));
        assert_eq!(changes.kind, Some(IssueKind::Feature));
        assert_eq!(changes.status, Some(IssueStatus::InProgress));
        assert_eq!(changes.priority, Some(Priority::HIGHEST));
        assert_eq!(
            changes.fields(),
            vec![Field::Title, Field::Kind, Field::Status, Field::Priority]
        );
    }

    #[test]
    fn empty_description_is_a_real_update() {
        let changes = IssuePatch::new().description("").validate(&target()).unwrap();
        assert_eq!(changes.description.as_deref(), Some(""));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert_eq!(
            IssuePatch::new().title(" ").validate(&target()).unwrap_err(),
            ValidationError::EmptyTitle
        );
        assert!(matches!(
            IssuePatch::new().kind("story").validate(&target()),
            Err(ValidationError::InvalidKind(_))
        ));
        assert!(matches!(
            IssuePatch::new().status("done").validate(&target()),
            Err(ValidationError::InvalidStatus(_))
        ));
        assert!(matches!(
            IssuePatch::new().priority(4).validate(&target()),
            Err(ValidationError::InvalidPriority(_))
        ));
    }

    #[test]
    fn parent_changes() {
        let changes = IssuePatch::new()
            .parent("FAZ-CD34")
            .validate(&target())
            .unwrap();
        assert_eq!(
            changes.parent,
            Some(ParentChange::Set(IssueId::parse("faz-cd34").unwrap()))
        );

        let changes = IssuePatch::new().clear_parent().validate(&target()).unwrap();
        assert_eq!(changes.parent, Some(ParentChange::Clear));
    }

    #[test]
    fn parent_guards() {
        assert!(matches!(
            IssuePatch::new().parent("faz-cd34.0").validate(&target()),
            Err(ValidationError::Id(IdError::UnsupportedNesting(_)))
        ));
        assert!(matches!(
            IssuePatch::new().parent("faz-ab12").validate(&target()),
            Err(ValidationError::SelfParent(_))
        ));
        assert!(matches!(
            IssuePatch::new().parent("bogus").validate(&target()),
            Err(ValidationError::Id(IdError::InvalidIdentifier(_)))
        ));
    }

    #[test]
    fn set_by_name() {
        let mut patch = IssuePatch::new();
        patch.set("priority", "1").unwrap();
        patch.set("parent", "").unwrap();
        patch.set("type", "bug").unwrap();

        assert_eq!(patch.priority, Some(1));
        assert_eq!(patch.parent, Some(ParentChange::Clear));
        assert_eq!(patch.kind.as_deref(), Some("bug"));

        assert!(matches!(
            patch.set("owner", "me"),
            Err(ValidationError::UnsupportedField(_))
        ));
        assert!(matches!(
            patch.set("priority", "high"),
            Err(ValidationError::InvalidPriority(_))
        ));
    }
}
