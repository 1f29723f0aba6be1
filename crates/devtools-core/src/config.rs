//! Configuration for tool timeouts, launchers and detection defaults.

use core::time::Duration;
use std::fs;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use serde::{Deserialize, Serialize};
use toml::{from_str, to_string_pretty};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::OperationKind;

/// Complete tooling configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolingConfig {
    /// Per-operation time budgets
    pub timeouts: TimeoutConfig,
    /// Programs used to launch interpreter-hosted tools
    pub launchers: LauncherConfig,
    /// Tool detection settings
    pub detection: DetectionConfig,
}

/// Time budgets in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Budget for lint runs
    pub lint_seconds: u64,
    /// Budget for format runs
    pub format_seconds: u64,
    /// Budget for test runs
    pub test_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            lint_seconds: 30,
            format_seconds: 30,
            test_seconds: 120,
        }
    }
}

/// Launcher programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Python interpreter used for `-m` style tools
    pub python: String,
    /// Node package runner used for node tools
    pub node: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_owned(),
            node: "npx".to_owned(),
        }
    }
}

/// Detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Test framework used when no directory probe matches
    pub default_test_framework: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            default_test_framework: "pytest".to_owned(),
        }
    }
}

impl ToolingConfig {
    /// Time budget for an operation.
    pub fn timeout_for(&self, kind: OperationKind) -> Duration {
        let seconds = match kind {
            OperationKind::Lint => self.timeouts.lint_seconds,
            OperationKind::Format => self.timeouts.format_seconds,
            OperationKind::Test => self.timeouts.test_seconds,
        };
        Duration::from_secs(seconds)
    }

    /// Get the default config directory path (`~/.devtools`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".devtools"))
    }

    /// Get the default config file path (`~/.devtools/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, creating it with defaults if absent
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = from_str(&contents)?;
        config.validate()?;

        debug!(
            "Loaded config from {:?}: python={}, node={}, default_test_framework={}",
            path,
            config.launchers.python,
            config.launchers.node,
            config.detection.default_test_framework
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Devtools Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// Reject values that can never launch a tool.
    ///
    /// # Errors
    /// Returns an error naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("timeouts.lint_seconds", self.timeouts.lint_seconds),
            ("timeouts.format_seconds", self.timeouts.format_seconds),
            ("timeouts.test_seconds", self.timeouts.test_seconds),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, seconds)| *seconds == 0) {
            return Err(Error::Config(format!("{field} must be greater than zero")));
        }

        let programs = [
            ("launchers.python", &self.launchers.python),
            ("launchers.node", &self.launchers.node),
            (
                "detection.default_test_framework",
                &self.detection.default_test_framework,
            ),
        ];
        if let Some((field, _)) = programs.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::Config(format!("{field} must not be empty")));
        }

        Ok(())
    }
}
