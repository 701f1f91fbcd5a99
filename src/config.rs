//! Compiler configuration, loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file does not exist: {0}")]
    Missing(PathBuf),

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables of the segment compiler. Every field has a default, so a config
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Row cap of a filtered query.
    pub row_limit: u32,
    /// Row cap of the query returned for an empty filter list.
    pub default_limit: u32,
    /// Terminals whose sales are not customer visits.
    pub excluded_visit_terminals: Vec<String>,
    /// Terminal that books automatic membership recharges.
    pub recharge_terminal: String,
    /// Write numeric values into the SQL text instead of binding them.
    pub inline_literals: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            row_limit: 500,
            default_limit: 100,
            excluded_visit_terminals: vec!["Automatic Recharge".to_string()],
            recharge_terminal: "Automatic Recharge".to_string(),
            inline_literals: false,
        }
    }
}

impl CompilerConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
