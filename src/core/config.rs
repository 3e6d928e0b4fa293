//! Configuration
//!
//! Looked up in order: an explicit path, `$CABLETRACE_CONFIG`, then
//! `config.yaml` in the user config directory. A missing file yields the
//! defaults; a file that exists but does not parse is an error.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::tracer::TraceConfig;
use crate::yaml::{parse_yaml_file, YamlError};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "CABLETRACE_CONFIG";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    #[diagnostic(code(cabletrace::config::not_found))]
    NotFound(PathBuf),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trace: TraceConfig,
    pub store: StoreConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database; unset means the command's own default
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

impl Config {
    /// Load configuration following the lookup order
    ///
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            return Self::from_file(&path);
        }

        match Self::user_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(parse_yaml_file(path)?)
    }

    /// `config.yaml` in the platform's user config directory
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cabletrace").map(|dirs| dirs.config_dir().join("config.yaml"))
    }
}
