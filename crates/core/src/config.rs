//! Spektacular configuration
//!
//! Loaded from `.spektacular/config.yaml`. Every field has a default so a
//! partial file only overrides what it names.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Location of the config file relative to a project root.
pub const CONFIG_FILE: &str = ".spektacular/config.yaml";

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent subprocess settings
    pub agent: AgentSettings,
    /// Raw protocol debug logging
    pub debug: DebugSettings,
}

/// Settings for the coding agent subprocess
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Registered runner backend used to drive the agent
    pub backend: String,
    /// Agent binary (name on PATH or absolute path)
    pub command: String,
    /// Extra arguments appended after the prompt flags
    pub args: Vec<String>,
    /// Tool names passed via `--allowedTools`
    pub allowed_tools: Vec<String>,
    /// Tool names passed via `--disallowedTools`
    pub disallowed_tools: Vec<String>,
    /// Pass `--dangerously-skip-permissions`
    pub dangerously_skip_permissions: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            backend: "claude".to_string(),
            command: "claude".to_string(),
            args: vec![
                "--output-format".to_string(),
                "stream-json".to_string(),
                "--verbose".to_string(),
            ],
            allowed_tools: [
                "Task", "Bash", "Read", "Write", "Edit", "Glob", "Grep", "WebFetch", "WebSearch",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            disallowed_tools: Vec::new(),
            dangerously_skip_permissions: false,
        }
    }
}

/// Debug logging of the raw agent stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    pub enabled: bool,
    /// Log directory, relative to the agent's working directory
    pub log_dir: PathBuf,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: PathBuf::from(".spektacular/logs"),
        }
    }
}

impl Config {
    /// Parse YAML text, expanding `${VAR}` references first.
    pub fn from_yaml_str(raw: &str, origin: &Path) -> Result<Self> {
        let expanded = expand_env_vars(raw);
        let config: Config = serde_yaml::from_str(&expanded).map_err(|source| Error::Config {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&raw, path)
    }

    /// Load `.spektacular/config.yaml` under a project root.
    pub async fn load_for_project(project_path: &Path) -> Result<Self> {
        Self::load(&project_path.join(CONFIG_FILE)).await
    }

    /// Write the config as YAML, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, yaml).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.command.trim().is_empty() {
            return Err(Error::InvalidConfig("agent.command must not be empty".into()));
        }
        if self.agent.backend.trim().is_empty() {
            return Err(Error::InvalidConfig("agent.backend must not be empty".into()));
        }
        Ok(())
    }
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
fn expand_env_vars(raw: &str) -> String {
    ENV_VAR_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
