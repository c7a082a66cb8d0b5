//! Domain models for faz
//!
//! Contains the issue model, identifier rules and request validation,
//! without any I/O concerns.

mod filter;
mod id;
mod issue;
mod lease;
mod patch;

pub use filter::{ListFilter, ListRequest};
pub use id::{project_token, IdError, IssueId, RandomSuffix, SuffixGenerator, SUFFIX_LEN};
pub use issue::{
    Issue, IssueDraft, IssueKind, IssueStatus, NewIssue, Priority, ValidationError,
};
pub use lease::{format_ttl, parse_ttl, ClaimLease};
pub use patch::{Field, FieldChanges, IssuePatch, ParentChange};
