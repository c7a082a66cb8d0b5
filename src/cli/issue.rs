//! Issue CLI commands

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use tracing::debug;

use super::output::{issue_summary, Output};
use crate::domain::{format_ttl, parse_ttl, Issue, IssuePatch, NewIssue};
use crate::service::{IssueService, ServiceError};
use crate::storage::Project;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Args)]
pub struct CreateArgs {
    /// Issue title
    pub title: String,

    /// Issue type (epic|task|bug|feature|chore|decision); defaults to [defaults] kind
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,

    /// Priority from 0 (highest) to 3; defaults to [defaults] priority
    #[arg(long, short = 'p')]
    pub priority: Option<i64>,

    /// Why this issue exists and what needs to be done
    #[arg(long, short = 'd', default_value = "")]
    pub description: String,

    /// Parent issue ID
    #[arg(long)]
    pub parent: Option<String>,

    /// Initial status (open|in_progress|closed)
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Issue ID
    pub id: String,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// New type
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,

    /// New priority (0-3)
    #[arg(long, short = 'p')]
    pub priority: Option<i64>,

    /// New status; prefer close/reopen/claim, which also manage timestamps and leases
    #[arg(long)]
    pub status: Option<String>,

    /// New parent issue ID
    #[arg(long, conflicts_with = "clear_parent")]
    pub parent: Option<String>,

    /// Remove the parent link
    #[arg(long)]
    pub clear_parent: bool,

    /// Raw field assignment, e.g. --set priority=1 (repeatable)
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub assignments: Vec<String>,
}

impl UpdateArgs {
    fn into_patch(self) -> Result<IssuePatch> {
        let mut patch = IssuePatch::new();

        if let Some(title) = self.title {
            patch = patch.title(title);
        }
        if let Some(description) = self.description {
            patch = patch.description(description);
        }
        if let Some(kind) = self.kind {
            patch = patch.kind(kind);
        }
        if let Some(priority) = self.priority {
            patch = patch.priority(priority);
        }
        if let Some(status) = self.status {
            patch = patch.status(status);
        }
        if let Some(parent) = self.parent {
            patch = patch.parent(parent);
        }
        if self.clear_parent {
            patch = patch.clear_parent();
        }

        for assignment in &self.assignments {
            let Some((name, value)) = assignment.split_once('=') else {
                bail!("Invalid --set '{}': expected FIELD=VALUE", assignment);
            };
            patch.set(name.trim(), value)?;
        }

        Ok(patch)
    }
}

fn open_service() -> Result<(Project, IssueService)> {
    let project = Project::open_current()?;
    debug!(root = %project.root().display(), "opened project");
    let service = project.service()?;
    Ok((project, service))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Create an issue
pub fn create(output: &Output, args: CreateArgs) -> Result<()> {
    let (project, mut service) = open_service()?;
    let defaults = &project.config().project.defaults;

    let kind = args.kind.unwrap_or_else(|| defaults.kind.clone());
    let priority = args.priority.unwrap_or(defaults.priority);
    let description = args.description.trim().to_string();

    if description.is_empty() && !output.is_json() {
        println!("Warning: creating issue without description.");
        println!("  Issues without descriptions lack context for future work.");
        println!("  Consider adding --description \"Why this issue exists and what needs to be done\"");
    }

    let mut new = NewIssue::new(args.title, kind)
        .with_description(description)
        .with_priority(priority);
    if let Some(parent) = args.parent {
        new = new.with_parent(parent);
    }
    if let Some(status) = args.status {
        new = new.with_status(status);
    }

    let id = service.create(new)?;
    let issue = service.get(&id)?;

    if output.is_json() {
        output.data(&issue);
    } else {
        println!("Created issue: {}", issue.id);
        println!("  Title: {}", issue.title);
        println!("  Type: {}", issue.kind);
        println!("  Priority: {}", issue.priority);
        println!("  Status: {}", issue.status);
        if let Some(parent) = &issue.parent_id {
            println!("  Parent: {}", parent);
        }
    }

    Ok(())
}

/// Change issue fields
pub fn update(output: &Output, args: UpdateArgs) -> Result<()> {
    let (_project, service) = open_service()?;
    let id = IssueService::normalize_id(&args.id)?;
    let patch = args.into_patch()?;

    service.update(id.as_str(), patch)?;

    if output.is_json() {
        output.data(&service.get(id.as_str())?);
    } else {
        output.success(&format!("Updated issue: {}", id));
    }

    Ok(())
}

/// Show an issue with its relations
pub fn show(output: &Output, raw_id: &str) -> Result<()> {
    let (_project, service) = open_service()?;
    let id = IssueService::normalize_id(raw_id)?;

    let issue = service.get(id.as_str())?;
    let children = service.children(id.as_str())?;
    let dependencies = service.dependencies(id.as_str())?;
    let dependents = service.dependents(id.as_str())?;

    let now = Utc::now();
    let lease_expired = issue
        .claim
        .map(|lease| lease.is_expired_at(now))
        .unwrap_or(false);

    if output.is_json() {
        output.data(&serde_json::json!({
            "issue": issue,
            "children": children,
            "dependencies": dependencies,
            "dependents": dependents,
            "lease_expired": lease_expired,
        }));
        return Ok(());
    }

    println!("ID: {}", issue.id);
    println!("Title: {}", issue.title);
    println!("Type: {}", issue.kind);
    println!("Priority: {}", issue.priority);
    println!("Status: {}", issue.status);
    if let Some(parent) = &issue.parent_id {
        println!("Parent: {}", parent);
    }
    println!("Created: {}", timestamp(issue.created_at));
    println!("Updated: {}", timestamp(issue.updated_at));
    if let Some(closed_at) = issue.closed_at {
        println!("Closed: {}", timestamp(closed_at));
    }
    if let Some(lease) = issue.claim {
        println!("Claimed: {}", timestamp(lease.claimed_at));
        if lease_expired {
            println!("Lease expires: {} (lease expired)", timestamp(lease.expires_at));
        } else {
            println!("Lease expires: {}", timestamp(lease.expires_at));
        }
    }
    if !issue.description.trim().is_empty() {
        println!();
        println!("Description:");
        println!("{}", issue.description);
    }

    println!();
    print_section("Children", &children, issue_summary);
    print_section("Dependencies", &dependencies, |dep| {
        format!("{} [{}]", dep.id, dep.title)
    });
    print_section("Dependents", &dependents, |dep| {
        format!("{} [{}]", dep.id, dep.title)
    });

    Ok(())
}

fn print_section(title: &str, issues: &[Issue], line: impl Fn(&Issue) -> String) {
    println!("{}:", title);
    if issues.is_empty() {
        println!("  none");
    }
    for issue in issues {
        println!("  {}", line(issue));
    }
}

/// Claim an issue
///
/// Contention is not an error: the message tells the caller to pick other work.
pub fn claim(output: &Output, raw_id: &str, ttl: Option<&str>) -> Result<()> {
    let (project, service) = open_service()?;
    let id = IssueService::normalize_id(raw_id)?;

    let ttl = match ttl {
        Some(raw) => parse_ttl(raw)?,
        None => project
            .config()
            .claim_ttl()
            .context("Failed to read the default claim lease")?,
    };

    match service.claim(id.as_str(), ttl) {
        Ok(lease) => {
            if output.is_json() {
                output.data(&serde_json::json!({
                    "id": id,
                    "claimed": true,
                    "status": "in_progress",
                    "claimed_at": lease.claimed_at,
                    "expires_at": lease.expires_at,
                }));
            } else {
                println!("Claimed issue: {}", id);
                println!("  Status: in_progress");
                println!("  Lease TTL: {}", format_ttl(lease.ttl()));
            }
            Ok(())
        }
        Err(e) if e.is_already_claimed() => {
            if output.is_json() {
                output.data(&serde_json::json!({
                    "id": id,
                    "claimed": false,
                    "message": "This task is already claimed, try another one",
                }));
            } else {
                println!("This task is already claimed, try another one");
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Runs `action` on every ID in order and stops at the first failure
fn for_each_id(
    output: &Output,
    raw_ids: &[String],
    verb: &str,
    past: &str,
    action: impl Fn(&IssueService, &str) -> Result<(), ServiceError>,
) -> Result<()> {
    let (_project, service) = open_service()?;

    let mut done = Vec::with_capacity(raw_ids.len());
    for raw in raw_ids {
        let id = IssueService::normalize_id(raw)?;
        action(&service, id.as_str()).with_context(|| format!("Failed to {} {}", verb, id))?;
        if !output.is_json() {
            println!("{} issue: {}", past, id);
        }
        done.push(id);
    }

    if output.is_json() {
        output.data(&serde_json::json!({ "action": verb, "ids": done }));
    }

    Ok(())
}

/// Close issues
pub fn close(output: &Output, ids: &[String]) -> Result<()> {
    for_each_id(output, ids, "close", "Closed", IssueService::close)
}

/// Reopen issues
pub fn reopen(output: &Output, ids: &[String]) -> Result<()> {
    for_each_id(output, ids, "reopen", "Reopened", IssueService::reopen)
}

/// Delete issues
pub fn delete(output: &Output, ids: &[String]) -> Result<()> {
    for_each_id(output, ids, "delete", "Deleted", IssueService::delete)
}
