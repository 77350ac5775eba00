//! Compiler Configuration Module
//!
//! Manages persistent defaults for the compiler.
//! Config is stored in `~/.config/gh-aw/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags (`--strict`, `--action-mode`, `--trial-repo`)
//! 2. Environment variables (`GH_AW_ACTION_MODE`, `GITHUB_REF`, `GITHUB_EVENT_NAME`, `DEBUG`)
//! 3. Config file (`~/.config/gh-aw/config.toml`)
//! 4. Defaults

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AwError, Result};

/// How the emitted workflow obtains its runtime scripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// Local `./actions/setup` checkout (development of the compiler itself)
    #[default]
    Dev,
    /// Published `github/gh-aw/actions/setup@v<version>`
    Release,
    /// Plain shell script, no composite action
    Script,
}

impl ActionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Dev => "dev",
            ActionMode::Release => "release",
            ActionMode::Script => "script",
        }
    }

    /// Detect the action mode from the environment.
    ///
    /// `GH_AW_ACTION_MODE` wins when it names a valid mode. Otherwise a release
    /// tag, a `release-*` branch or a `release` event selects release mode.
    /// Takes a lookup function so tests don't have to mutate the process env.
    pub fn detect<F>(lookup: F) -> ActionMode
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(explicit) = lookup("GH_AW_ACTION_MODE") {
            if let Ok(mode) = explicit.parse() {
                return mode;
            }
        }

        if let Some(git_ref) = lookup("GITHUB_REF") {
            if git_ref.starts_with("refs/tags/") || git_ref.starts_with("refs/heads/release-") {
                return ActionMode::Release;
            }
        }

        if lookup("GITHUB_EVENT_NAME").as_deref() == Some("release") {
            return ActionMode::Release;
        }

        ActionMode::Dev
    }
}

impl FromStr for ActionMode {
    type Err = AwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "dev" => Ok(ActionMode::Dev),
            "release" => Ok(ActionMode::Release),
            "script" => Ok(ActionMode::Script),
            other => Err(AwError::schema(
                "features.action-mode",
                format!("unknown action mode '{}' (expected dev, release or script)", other),
            )),
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trial mode: check out a different repository in place of the default
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrialConfig {
    /// `owner/repo` checked out instead of the workflow's repository
    pub repository: String,
    /// Token expression used for the trial checkout
    #[serde(default)]
    pub token: Option<String>,
}

impl TrialConfig {
    pub fn token_expr(&self) -> &str {
        self.token
            .as_deref()
            .unwrap_or("${{ secrets.GH_AW_GITHUB_TOKEN }}")
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompilerConfig {
    /// Force strict validation for every workflow
    #[serde(default)]
    pub strict: bool,

    /// Action mode override; detected from the environment when unset
    #[serde(default)]
    pub action_mode: Option<ActionMode>,

    /// Trial mode checkout override
    #[serde(default)]
    pub trial: Option<TrialConfig>,

    /// Extra action pins: `"owner/repo@version" = "<sha>"`
    #[serde(default)]
    pub pins: BTreeMap<String, String>,

    /// Verbose logging (set from `DEBUG`)
    #[serde(skip)]
    pub verbose: bool,
}

impl CompilerConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/gh-aw/` on Unix, `%APPDATA%/gh-aw/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gh-aw")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default location.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path.
    ///
    /// Returns error if the file exists but is malformed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AwError::ConfigError {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| AwError::ConfigError {
            reason: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Merge with process environment variables
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Merge with an arbitrary environment lookup.
    ///
    /// An explicit `GH_AW_ACTION_MODE` beats the config file; ref-based
    /// detection only fills in when the file left the mode unset.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = lookup("GH_AW_ACTION_MODE").and_then(|v| v.parse::<ActionMode>().ok());
        if let Some(mode) = explicit {
            self.action_mode = Some(mode);
        } else if self.action_mode.is_none() {
            self.action_mode = Some(ActionMode::detect(&lookup));
        }

        if let Some(debug) = lookup("DEBUG") {
            if !debug.is_empty() && debug != "0" && debug != "false" {
                self.verbose = true;
            }
        }

        self
    }

    /// Effective action mode (dev when nothing set it)
    pub fn effective_action_mode(&self) -> ActionMode {
        self.action_mode.unwrap_or_default()
    }
}
