//! Configuration handling for faz
//!
//! Configuration is stored in `.faz/config.toml` (project) and
//! `~/.config/faz/config.toml` (global). Both files are optional.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::project::FAZ_DIR;
use crate::domain::{parse_ttl, project_token, IssueKind, Priority};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// `[project]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectSection {
    /// Name used to derive the ID token (defaults to the directory name)
    pub name: Option<String>,
}

/// `[defaults]` table, applied by `faz create`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultsSection {
    /// Issue type when `--type` is omitted
    pub kind: String,

    /// Priority when `--priority` is omitted
    pub priority: i64,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            kind: IssueKind::default().as_str().to_string(),
            priority: i64::from(Priority::default().value()),
        }
    }
}

/// `[claim]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClaimSection {
    /// Lease length when `--ttl` is omitted
    pub ttl: String,
}

impl Default for ClaimSection {
    fn default() -> Self {
        Self {
            ttl: "1h".to_string(),
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub defaults: DefaultsSection,
    pub claim: ClaimSection,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Output format when `--format` is not given
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "faz", "faz").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(FAZ_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")
    }

    /// Finds the project root by looking for a `.faz/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_root_from(&current)
    }

    /// Walks up from `start` to the nearest directory holding `.faz/`
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(FAZ_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Project token used for new root IDs
    ///
    /// `[project] name` wins, then the project directory name.
    pub fn id_token(&self) -> String {
        let name = self
            .project
            .project
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.project_root
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_default();

        project_token(&name)
    }

    /// Default claim lease length
    pub fn claim_ttl(&self) -> Result<Duration, ConfigError> {
        parse_ttl(&self.project.claim.ttl)
            .map_err(|e| ConfigError::Invalid(format!("[claim] ttl: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_at(root: Option<&Path>, project: ProjectConfig) -> Config {
        Config {
            project,
            global: GlobalConfig::default(),
            project_root: root.map(Path::to_path_buf),
        }
    }

    #[test]
    fn default_config() {
        let config = config_at(None, ProjectConfig::default());

        assert_eq!(config.project.defaults.kind, "task");
        assert_eq!(config.project.defaults.priority, 2);
        assert_eq!(config.claim_ttl().unwrap(), Duration::hours(1));
        assert_eq!(config.global.default_format, OutputFormat::Text);
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[project]
name = "Payments API"

[defaults]
kind = "bug"
priority = 1

[claim]
ttl = "30m"
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project.name.as_deref(), Some("Payments API"));
        assert_eq!(config.defaults.kind, "bug");
        assert_eq!(config.defaults.priority, 1);
        assert_eq!(config.claim.ttl, "30m");
    }

    #[test]
    fn partial_project_config_keeps_defaults() {
        let config: ProjectConfig = toml::from_str("[claim]\nttl = \"2h\"\n").unwrap();
        assert_eq!(config.defaults, DefaultsSection::default());
        assert!(config.project.name.is_none());
    }

    #[test]
    fn parse_global_config() {
        let config: GlobalConfig = toml::from_str("default_format = \"json\"\n").unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn invalid_claim_ttl() {
        let mut project = ProjectConfig::default();
        project.claim.ttl = "soon".to_string();
        let config = config_at(None, project);

        assert!(matches!(config.claim_ttl(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn id_token_precedence() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("My Repo");
        fs::create_dir_all(&root).unwrap();

        let from_dir = config_at(Some(&root), ProjectConfig::default());
        assert_eq!(from_dir.id_token(), "my_repo");

        let mut project = ProjectConfig::default();
        project.project.name = Some("Faz".to_string());
        let from_name = config_at(Some(&root), project);
        assert_eq!(from_name.id_token(), "faz");

        assert_eq!(config_at(None, ProjectConfig::default()).id_token(), "project");
    }

    #[test]
    fn find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(FAZ_DIR)).unwrap();

        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        assert_eq!(
            Config::find_project_root_from(&sub_dir),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn config_not_in_project() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::find_project_root_from(dir.path()), None);
    }

    #[test]
    fn parse_errors_are_reported() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(FAZ_DIR)).unwrap();
        fs::write(dir.path().join(FAZ_DIR).join("config.toml"), "[defaults\n").unwrap();

        let err = Config::for_project(dir.path()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }
}
