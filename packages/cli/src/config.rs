use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "scl.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// How plans are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// SCL tool configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Spaces per level when documents are written back
    pub indent: usize,

    pub format: OutputFormat,

    /// Default tracing filter, `RUST_LOG` takes precedence
    pub log_filter: String,

    /// `xsi:type` handling for `updateGse` intents that leave it open
    pub inst_type: Option<bool>,

    /// Keep a `.bak` copy of files changed in place
    pub backup: bool,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let path = cwd.join(DEFAULT_CONFIG_NAME);
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn indent_string(&self) -> String {
        " ".repeat(self.indent)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indent: 2,
            format: OutputFormat::Text,
            log_filter: "warn".to_string(),
            inst_type: None,
            backup: false,
        }
    }
}
