//! Runtime configuration loaded from TOML files

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, FluxError};

/// Default nesting depth for the `deep-thenable` scenario
pub const DEFAULT_SCENARIO_DEPTH: usize = 64;

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub event_loop: EventLoopConfig,
    pub logging: LoggingConfig,
    pub scenarios: ScenarioConfig,
}

/// Event loop section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Maximum tasks a single `run` may execute; unbounded when absent
    pub task_budget: Option<usize>,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

/// Scenario runner section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub depth: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_SCENARIO_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FluxError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| FluxError::Config(ConfigError::Io(e.to_string())))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, FluxError> {
        let config: RuntimeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String, FluxError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()).into())
    }

    fn validate(&self) -> Result<(), FluxError> {
        if self.event_loop.task_budget == Some(0) {
            return Err(ConfigError::Invalid("event_loop.task_budget must be positive".to_string()).into());
        }
        if self.scenarios.depth == 0 {
            return Err(ConfigError::Invalid("scenarios.depth must be positive".to_string()).into());
        }
        Ok(())
    }
}
