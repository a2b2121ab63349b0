//! Gantry Configuration Module
//!
//! Compiler settings live in `gantry.toml` next to (or above) the entry
//! file, or in the user config `~/.config/gantry/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Explicit `--config` path
//! 2. `gantry.toml` found walking up from the entry file
//! 3. User config file
//! 4. Defaults
//!
//! `GANTRY_PROJECT_ROOT` overrides `project_root` from any source.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GantryError, Result};
use crate::validate::MatrixLimits;

/// File name searched for next to the entry file and in its ancestors
pub const PROJECT_CONFIG_FILE: &str = "gantry.toml";

/// Environment variable overriding the project root
pub const PROJECT_ROOT_ENV: &str = "GANTRY_PROJECT_ROOT";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompilerConfig {
    /// Imports may not resolve outside this directory
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    #[serde(default)]
    pub matrix: MatrixLimits,

    #[serde(default)]
    pub actions: ActionRefs,

    #[serde(default)]
    pub cycles: CycleSettings,
}

/// Platform actions referenced by lowered steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActionRefs {
    pub agent: String,
    pub github_script: String,
    pub upload_artifact: String,
    pub download_artifact: String,
}

impl Default for ActionRefs {
    fn default() -> Self {
        Self {
            agent: "anthropics/claude-code-action@v1".into(),
            github_script: "actions/github-script@v7".into(),
            upload_artifact: "actions/upload-artifact@v4".into(),
            download_artifact: "actions/download-artifact@v4".into(),
        }
    }
}

/// Where cycle state is kept between re-dispatched runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CycleSettings {
    /// Runner directory holding `<cycle>/state.json`
    pub state_dir: String,
    /// State artifact is named `<cycle>-<suffix>`
    pub artifact_suffix: String,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            state_dir: ".gantry/state".into(),
            artifact_suffix: "state".into(),
        }
    }
}

impl CycleSettings {
    pub fn artifact_name(&self, cycle: &str) -> String {
        format!("{}-{}", cycle, self.artifact_suffix)
    }

    pub fn state_path(&self, cycle: &str) -> String {
        format!("{}/{}", self.state_dir.trim_end_matches('/'), cycle)
    }
}

impl CompilerConfig {
    /// Get the user config directory path
    ///
    /// Returns `~/.config/gantry/` on Unix, `%APPDATA%/gantry/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gantry")
    }

    /// Get the user config file path
    pub fn user_config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration for compiling `entry`
    ///
    /// Returns defaults when no config file exists.
    /// Returns an error if a file exists but is malformed.
    pub fn load(explicit: Option<&Path>, entry: &Path) -> Result<Self> {
        let config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(GantryError::ConfigError {
                        reason: format!("config file not found: {}", path.display()),
                    });
                }
                Self::from_file(path)?
            }
            None => match Self::discover(entry) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    let user = Self::user_config_path();
                    if user.exists() {
                        Self::from_file(&user)?
                    } else {
                        Self::default()
                    }
                }
            },
        };
        let config = config.with_env();
        config.check()?;
        Ok(config)
    }

    /// Find `gantry.toml` in the entry file's directory or an ancestor
    pub fn discover(entry: &Path) -> Option<PathBuf> {
        let start = if entry.is_dir() { Some(entry) } else { entry.parent() };
        start?
            .ancestors()
            .map(|dir| dir.join(PROJECT_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Parse one config file; a relative `project_root` is taken relative
    /// to the file's directory
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let content = fs::read_to_string(path).map_err(|e| GantryError::ConfigError {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| GantryError::ConfigError {
            reason: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;
        if let (Some(root), Some(dir)) = (&config.project_root, path.parent()) {
            if root.is_relative() {
                config.project_root = Some(dir.join(root));
            }
        }
        Ok(config)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
            if !root.is_empty() {
                self.project_root = Some(PathBuf::from(root));
            }
        }
        self
    }

    /// Reject settings the compiler cannot work with
    pub fn check(&self) -> Result<()> {
        if self.matrix.warn_threshold >= self.matrix.max_jobs {
            return Err(GantryError::InvalidThresholds {
                warn: self.matrix.warn_threshold,
                max: self.matrix.max_jobs,
            });
        }
        Ok(())
    }

    /// Save configuration as a project file in `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(PROJECT_CONFIG_FILE);
        let content = toml::to_string_pretty(self).map_err(|e| GantryError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        fs::write(&path, content).map_err(|e| GantryError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })?;
        Ok(path)
    }
}
