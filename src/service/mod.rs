//! # Service Layer
//!
//! Business rules between the CLI and the store: input validation, ID
//! allocation and derived views such as ready work and the info summary.

mod issues;

pub use issues::{Info, IssueService, ServiceError, MAX_ID_ATTEMPTS, RECENT_LIMIT};
