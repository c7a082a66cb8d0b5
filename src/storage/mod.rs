//! # Storage Layer
//!
//! Persistence for faz, backed by a single SQLite database per project.
//!
//! ## Project Structure
//!
//! ```text
//! .faz/
//! ├── faz.db        # SQLite database (issues + dependencies)
//! └── config.toml   # Project configuration
//! ```
//!
//! ## Concurrency Safety
//!
//! - Each invocation opens one connection, runs one operation and exits
//! - Cross-process invariants live in SQLite constraints (unique public ID,
//!   foreign keys, CHECK against self-dependency)
//! - Claims are a single conditional UPDATE, so only one claimer wins
//! - WAL journaling plus a busy timeout let concurrent writers wait briefly
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a faz project
//! - [`IssueStore`] - Reads and writes issues and dependency edges
//! - [`Config`] - Project and global configuration

mod config;
mod project;
mod schema;
mod store;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig};
pub use project::{Project, ProjectError, DB_FILE, FAZ_DIR};
pub use schema::{schema_version, SCHEMA_VERSION};
pub use store::{IssueStore, StoreError};
