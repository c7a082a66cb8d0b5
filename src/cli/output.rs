//! Output formatting for CLI commands

use serde::Serialize;

use crate::domain::{Issue, IssueStatus};
use crate::storage;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => OutputFormat::Text,
            storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text => {
                if let Ok(json) = serde_json::to_string_pretty(data) {
                    println!("{}", json);
                }
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(data) {
                    println!("{}", json);
                }
            }
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints issues one per line, or as a JSON array
    pub fn issues(&self, issues: &[Issue]) {
        if self.is_json() {
            self.data(&issues);
            return;
        }

        if issues.is_empty() {
            println!("No issues found");
            return;
        }
        for issue in issues {
            println!("{}", issue_line(issue));
        }
    }
}

/// Single-character marker for a status
pub fn status_symbol(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::Open => "○",
        IssueStatus::InProgress => "◐",
        IssueStatus::Closed => "✓",
    }
}

/// `○ faz-ab12 [P1] [task] - Title`
pub fn issue_line(issue: &Issue) -> String {
    format!(
        "{} {} [{}] [{}] - {}",
        status_symbol(issue.status),
        issue.id,
        issue.priority,
        issue.kind,
        issue.title
    )
}

/// `faz-ab12 [task P1 open] Title`, used in nested listings
pub fn issue_summary(issue: &Issue) -> String {
    format!(
        "{} [{} {} {}] {}",
        issue.id, issue.kind, issue.priority, issue.status, issue.title
    )
}
