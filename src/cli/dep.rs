//! Dependency CLI commands

use anyhow::Result;
use clap::{Subcommand, ValueEnum};

use super::output::Output;
use crate::service::IssueService;
use crate::storage::Project;

/// Which side of the dependency edges to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Direction {
    /// Issues this issue waits on
    #[default]
    Down,
    /// Issues waiting on this issue
    Up,
}

#[derive(Subcommand)]
pub enum DepCommands {
    /// Make an issue wait on another
    ///
    /// Example:
    ///   faz dep add faz-ab12.0 faz-ab12   # faz-ab12.0 waits on faz-ab12
    Add {
        /// Issue that will be blocked
        issue: String,

        /// Issue that must be closed first
        depends_on: String,
    },

    /// Remove a dependency
    Remove {
        /// Blocked issue
        issue: String,

        /// Dependency to remove
        depends_on: String,
    },

    /// List dependencies (down) or dependents (up)
    List {
        /// Issue ID
        id: String,

        /// down: what this issue waits on, up: what waits on it
        #[arg(long, value_enum, default_value_t = Direction::Down)]
        direction: Direction,
    },
}

pub fn run(cmd: DepCommands, output: &Output) -> Result<()> {
    let service = Project::open_current()?.service()?;

    match cmd {
        DepCommands::Add { issue, depends_on } => add(&service, output, &issue, &depends_on),
        DepCommands::Remove { issue, depends_on } => {
            remove(&service, output, &issue, &depends_on)
        }
        DepCommands::List { id, direction } => list(&service, output, &id, direction),
    }
}

fn add(service: &IssueService, output: &Output, issue: &str, depends_on: &str) -> Result<()> {
    let issue = IssueService::normalize_id(issue)?;
    let depends_on = IssueService::normalize_id(depends_on)?;
    service.add_dependency(issue.as_str(), depends_on.as_str())?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "issue": issue,
            "depends_on": depends_on,
            "added": true,
        }));
    } else {
        println!("Added dependency: {} depends on {}", issue, depends_on);
    }

    Ok(())
}

fn remove(service: &IssueService, output: &Output, issue: &str, depends_on: &str) -> Result<()> {
    let issue = IssueService::normalize_id(issue)?;
    let depends_on = IssueService::normalize_id(depends_on)?;
    service.remove_dependency(issue.as_str(), depends_on.as_str())?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "issue": issue,
            "depends_on": depends_on,
            "removed": true,
        }));
    } else {
        println!("Removed dependency: {} no longer depends on {}", issue, depends_on);
    }

    Ok(())
}

fn list(service: &IssueService, output: &Output, id: &str, direction: Direction) -> Result<()> {
    let id = IssueService::normalize_id(id)?;
    let (issues, label) = match direction {
        Direction::Down => (service.dependencies(id.as_str())?, "Dependencies"),
        Direction::Up => (service.dependents(id.as_str())?, "Dependents"),
    };

    if output.is_json() {
        output.data(&issues);
        return Ok(());
    }

    println!("{} of {}:", label, id);
    if issues.is_empty() {
        println!("  none");
    }
    for issue in &issues {
        println!("  {} [{}] {}", issue.id, issue.status, issue.title);
    }

    Ok(())
}
