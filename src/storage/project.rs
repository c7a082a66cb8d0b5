//! Project management
//!
//! Handles project initialization and provides access to the issue store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use super::{Config, IssueStore};
use crate::domain::RandomSuffix;
use crate::service::IssueService;

/// Per-project directory holding the database and config
pub const FAZ_DIR: &str = ".faz";

/// Database file name inside [`FAZ_DIR`]
pub const DB_FILE: &str = "faz.db";

/// Line added to `.git/info/exclude`
const GIT_EXCLUDE_ENTRY: &str = ".faz/";

const DEFAULT_CONFIG: &str = r#"# faz configuration

[project]
# Name used to derive issue IDs (defaults to the directory name)
# name = "my-project"

[defaults]
# Type and priority for 'faz create' when not given
kind = "task"
priority = 2

[claim]
# Lease length for 'faz claim' when --ttl is not given
ttl = "1h"
"#;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a faz project. Run 'faz init' first.")]
    NotInProject,

    #[error("Project at {0} is not initialized (missing database). Run 'faz init' first.")]
    NotInitialized(PathBuf),
}

/// A faz project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let faz_dir = root.join(FAZ_DIR);

        if !faz_dir.is_dir() {
            return Err(ProjectError::NotInProject.into());
        }
        if !faz_dir.join(DB_FILE).is_file() {
            return Err(ProjectError::NotInitialized(root).into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    ///
    /// Safe to run again: existing config and data are kept.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let faz_dir = root.join(FAZ_DIR);

        fs::create_dir_all(&faz_dir).with_context(|| {
            format!("Failed to create .faz directory: {}", faz_dir.display())
        })?;

        let config_path = faz_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let db_path = faz_dir.join(DB_FILE);
        IssueStore::open(&db_path)
            .with_context(|| format!("Failed to create database: {}", db_path.display()))?;

        if exclude_from_git(&root)? {
            info!(root = %root.display(), "added .faz/ to .git/info/exclude");
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .faz directory path
    pub fn faz_dir(&self) -> PathBuf {
        self.root.join(FAZ_DIR)
    }

    /// Returns the database path
    pub fn db_path(&self) -> PathBuf {
        self.faz_dir().join(DB_FILE)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the issue store
    pub fn store(&self) -> Result<IssueStore> {
        let db_path = self.db_path();
        debug!(path = %db_path.display(), "opening issue store");
        IssueStore::open(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))
    }

    /// Opens the issue service with this project's ID token
    pub fn service(&self) -> Result<IssueService> {
        Ok(IssueService::new(
            self.store()?,
            self.config.id_token(),
            Box::new(RandomSuffix::from_entropy()),
        ))
    }
}

/// Appends `.faz/` to `.git/info/exclude` when `root` is a git work tree
///
/// Returns true if the file was changed.
fn exclude_from_git(root: &Path) -> Result<bool> {
    let git_dir = root.join(".git");
    if !git_dir.is_dir() {
        return Ok(false);
    }

    let info_dir = git_dir.join("info");
    fs::create_dir_all(&info_dir)
        .with_context(|| format!("Failed to create {}", info_dir.display()))?;

    let exclude_path = info_dir.join("exclude");
    let existing = match fs::read_to_string(&exclude_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", exclude_path.display()))
        }
    };

    if existing.lines().any(|line| line.trim() == GIT_EXCLUDE_ENTRY) {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&exclude_path)
        .with_context(|| format!("Failed to open {}", exclude_path.display()))?;

    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    writeln!(file, "{}{}", separator, GIT_EXCLUDE_ENTRY)
        .with_context(|| format!("Failed to write {}", exclude_path.display()))?;

    Ok(true)
}
