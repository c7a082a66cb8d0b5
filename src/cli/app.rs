//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{dep, issue, query};
use crate::storage::{Config, Project};

/// Environment variable holding a tracing filter, e.g. `FAZ_LOG=faz=trace`
pub const LOG_ENV: &str = "FAZ_LOG";

#[derive(Parser)]
#[command(name = "faz")]
#[command(author, version, about = "Local issue tracking for AI agents and humans")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a faz project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Create an issue
    ///
    /// Examples:
    ///   faz create "Checkout revamp" --type epic --priority 1
    ///   faz create "Address validation" --parent faz-ab12
    Create(issue::CreateArgs),

    /// Change issue fields
    Update(issue::UpdateArgs),

    /// Inspect an issue with its children and dependencies
    Show {
        /// Issue ID
        id: String,
    },

    /// List issues with optional filters
    List(query::ListArgs),

    /// List direct children of a parent issue
    Children {
        /// Parent issue ID
        parent: String,
    },

    /// Show unblocked open work
    Ready,

    /// Claim an issue and move it to in_progress with a lease
    Claim {
        /// Issue ID
        id: String,

        /// Lease length (e.g. 30m, 1h, 2d); defaults to [claim] ttl
        #[arg(long)]
        ttl: Option<String>,
    },

    /// Mark issues closed
    Close {
        /// Issue IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Reopen closed issues
    Reopen {
        /// Issue IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Permanently remove issues
    Delete {
        /// Issue IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Manage dependencies
    #[command(subcommand)]
    Dep(dep::DepCommands),

    /// Show open count and the latest completed issues
    Info,

    /// Show a command overview with examples
    Recap,

    /// Show a quick faz introduction
    Onboard,
}

/// Installs the stderr log subscriber
///
/// `FAZ_LOG` wins over `--verbose`; without either only warnings show.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolves `--format`, falling back to the global config
fn resolve_format(flag: Option<OutputFormat>) -> OutputFormat {
    if let Some(format) = flag {
        return format;
    }

    match Config::load_global() {
        Ok(global) => global.default_format.into(),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "ignoring unreadable global config");
            OutputFormat::default()
        }
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = Output::new(resolve_format(cli.format));
    debug!("faz starting");

    match cli.command {
        Commands::Init { path } => init(&output, &path)?,

        Commands::Create(args) => issue::create(&output, args)?,
        Commands::Update(args) => issue::update(&output, args)?,
        Commands::Show { id } => issue::show(&output, &id)?,
        Commands::Claim { id, ttl } => issue::claim(&output, &id, ttl.as_deref())?,
        Commands::Close { ids } => issue::close(&output, &ids)?,
        Commands::Reopen { ids } => issue::reopen(&output, &ids)?,
        Commands::Delete { ids } => issue::delete(&output, &ids)?,

        Commands::List(args) => query::list(&output, args)?,
        Commands::Children { parent } => query::children(&output, &parent)?,
        Commands::Ready => query::ready(&output)?,
        Commands::Info => query::info(&output)?,
        Commands::Recap => query::recap(&output),
        Commands::Onboard => query::onboard(&output),

        Commands::Dep(cmd) => dep::run(cmd, &output)?,
    }

    Ok(())
}

fn init(output: &Output, path: &str) -> Result<()> {
    debug!(path, "initializing project");
    let project = Project::init(path)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "root": project.root(),
            "faz_dir": project.faz_dir(),
            "database": project.db_path(),
        }));
    } else {
        println!("Initialized faz project at {}", project.root().display());
        println!("  Directory: {}", project.faz_dir().display());
        println!("  Database: {}", project.db_path().display());
    }

    Ok(())
}
