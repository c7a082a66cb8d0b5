//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup and overview | `init`, `info`, `recap` |
//! | Issue | Work item lifecycle | `create`, `update`, `claim`, `close` |
//! | Query | Finding work | `list`, `children`, `ready`, `show` |
//! | Dependency | Ordering between issues | `dep add`, `dep remove`, `dep list` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Without the flag the global config's `default_format` applies.
//!
//! ## Logging
//!
//! Logs go to stderr. `--verbose` (or `-v`) turns on debug logs and
//! `FAZ_LOG` takes a full filter:
//! ```bash
//! FAZ_LOG=faz=trace faz ready
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod dep;
mod issue;
mod output;
mod query;

pub use app::{run, Cli, Commands, LOG_ENV};
pub use output::{Output, OutputFormat};
