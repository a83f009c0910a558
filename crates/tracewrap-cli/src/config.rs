//! CLI configuration management.
//!
//! Layered lowest to highest: config file, `TRACEWRAP_*` environment
//! variables, then per-invocation `execf` flags (applied by the caller).

use crate::commands::TraceBoundary;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracewrap_core::{Error, Result};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Overrides the detected service name.
    pub service_name: Option<String>,
    /// Overrides the detected span name.
    pub span_name: Option<String>,
    /// Tag spans with the full command argument list.
    #[serde(default)]
    pub tag_command_args: bool,
    /// Reserved trace scope selector.
    pub trace_boundary: Option<TraceBoundary>,
}

impl CliConfig {
    /// Load the configuration file (if any) and apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|err| Error::Config(err.to_string()))?;
        serde_yaml::from_str(&content).map_err(|err| Error::Config(err.to_string()))
    }

    /// Get the configuration file path.
    fn config_path() -> Option<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "tracewrap", "tracewrap")?;
        Some(dirs.config_dir().join("config.yaml"))
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("TRACEWRAP_SERVICE_NAME") {
            if !value.is_empty() {
                self.service_name = Some(value);
            }
        }
        if let Ok(value) = env::var("TRACEWRAP_SPAN_NAME") {
            if !value.is_empty() {
                self.span_name = Some(value);
            }
        }
        if let Ok(value) = env::var("TRACEWRAP_TAG_COMMAND_ARGS") {
            self.tag_command_args = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Ok(value) = env::var("TRACEWRAP_TRACE_BOUNDARY") {
            match value.as_str() {
                "pipeline" => self.trace_boundary = Some(TraceBoundary::Pipeline),
                "job" => self.trace_boundary = Some(TraceBoundary::Job),
                _ => {}
            }
        }
    }
}
