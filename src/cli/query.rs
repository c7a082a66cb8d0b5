//! Query commands (list, children, ready, info, recap, onboard)

use anyhow::Result;
use clap::Args;
use tracing::debug;

use super::output::{issue_summary, Output};
use crate::domain::ListRequest;
use crate::service::{IssueService, RECENT_LIMIT};
use crate::storage::Project;

#[derive(Args)]
pub struct ListArgs {
    /// Filter by issue type
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,

    /// Filter by status (closed issues are hidden unless asked for)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Filter by priority (0-3)
    #[arg(long, short = 'p')]
    pub priority: Option<i64>,

    /// Filter by parent issue ID
    #[arg(long)]
    pub parent: Option<String>,

    /// Include closed issues
    #[arg(long, short = 'a')]
    pub all: bool,
}

impl From<ListArgs> for ListRequest {
    fn from(args: ListArgs) -> Self {
        ListRequest {
            kind: args.kind,
            status: args.status,
            priority: args.priority,
            parent: args.parent,
            all: args.all,
        }
    }
}

fn open_service() -> Result<IssueService> {
    let project = Project::open_current()?;
    debug!(root = %project.root().display(), "opened project");
    project.service()
}

/// List issues
pub fn list(output: &Output, args: ListArgs) -> Result<()> {
    let service = open_service()?;
    let issues = service.list(args.into())?;
    debug!(count = issues.len(), "listed issues");

    output.issues(&issues);
    Ok(())
}

/// List direct children of a parent
pub fn children(output: &Output, parent: &str) -> Result<()> {
    let service = open_service()?;
    let parent = IssueService::normalize_id(parent)?;
    let children = service.children(parent.as_str())?;

    if output.is_json() {
        output.data(&children);
    } else if children.is_empty() {
        println!("No children for {}", parent);
    } else {
        println!("Children of {} ({}):", parent, children.len());
        for child in &children {
            println!("  {}", issue_summary(child));
        }
    }

    Ok(())
}

/// Show issues ready to work on
pub fn ready(output: &Output) -> Result<()> {
    let service = open_service()?;
    let ready = service.ready()?;
    debug!(count = ready.len(), "found ready issues");

    if output.is_json() {
        output.data(&ready);
    } else if ready.is_empty() {
        println!("No issues ready to work on.");
    } else {
        println!("Ready issues ({}):", ready.len());
        println!("{:<20} {:<9} {:<4} TITLE", "ID", "TYPE", "PRI");
        println!("{}", "-".repeat(60));
        for issue in &ready {
            println!(
                "{:<20} {:<9} {:<4} {}",
                issue.id,
                issue.kind.as_str(),
                issue.priority.to_string(),
                issue.title
            );
        }
    }

    Ok(())
}

/// Show the open count and the latest closed issues
pub fn info(output: &Output) -> Result<()> {
    let service = open_service()?;
    let info = service.info()?;

    if output.is_json() {
        output.data(&info);
        return Ok(());
    }

    println!("Open issues: {}", info.open_count);
    println!();
    println!("Latest completed (max {}):", RECENT_LIMIT);
    if info.recently_closed.is_empty() {
        println!("  none");
    }
    for issue in &info.recently_closed {
        let closed_at = issue
            .closed_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {} [{} {}] {} (closed {})",
            issue.id, issue.kind, issue.priority, issue.title, closed_at
        );
    }

    Ok(())
}

const RECAP: &str = r#"faz recap

Purpose
  Local task tracking for AI agents and humans with no remote integration

Core flow
  faz create "Checkout revamp" --type epic --priority 1 --description "Improve checkout flow"
  faz create "Add address validation" --parent faz-ab12 --description "Client and server checks"
  faz dep add faz-ab12.0 faz-ab12
  faz list --status open
  faz children faz-ab12
  faz ready
  faz claim faz-ab12.0 --ttl 30m
  faz close faz-ab12.0
  faz info

Commands
  onboard  Quick intro
  init     Create .faz/ with the database and config
  info     Open count and latest 5 completed
  create   Add issue
  claim    Claim issue and set in_progress with lease
  list     List issues with filters
  children List direct child issues for a parent
  ready    Show unblocked open work
  show     Inspect issue with children and dependencies
  update   Change issue fields
  close    Mark issues closed
  reopen   Reopen closed issues
  delete   Permanently remove issues
  dep      Manage dependencies (add, remove, list)

Every command accepts --format json and --verbose."#;

/// Print the command overview
pub fn recap(output: &Output) {
    if output.is_json() {
        output.data(&serde_json::json!({ "recap": RECAP }));
    } else {
        println!("{}", RECAP);
    }
}

const ONBOARD: &str = r#"## Issue Tracking

This project uses **faz** for issue tracking.
Run `faz recap` for a recap of faz commands.

**Quick reference:**
- `faz info` - Show open count and latest completed issues
- `faz ready` - Find unblocked work
- `faz claim <id>` - Take an issue before starting on it
- `faz create "Title" --type task --priority 2` - Create issue
- `faz close <id>` - Complete work"#;

/// Print a short introduction, suitable for pasting into agent instructions
pub fn onboard(output: &Output) {
    if output.is_json() {
        output.data(&serde_json::json!({ "onboard": ONBOARD }));
    } else {
        println!("{}", ONBOARD);
    }
}
