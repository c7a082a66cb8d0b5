//! faz - local issue tracking for AI agents and humans
//!
//! Issues live in a SQLite database under `.faz/` in the project directory.
//! They carry a type, a priority and a status, may have one level of child
//! issues, can wait on each other through dependency edges, and can be
//! claimed for a limited time so parallel workers do not pick the same item.

pub mod cli;
pub mod domain;
pub mod service;
pub mod storage;

pub use domain::{Issue, IssueId, IssueKind, IssueStatus, Priority};
pub use service::{IssueService, ServiceError};
