//! Engine configuration file parsing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::runner::ds::heap::HeapConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Switches for engine behaviour.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Whether `import()` may load modules. Off unless the host opts in.
    pub dynamic_imports_allowed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeapSettings {
    /// Maximum heap size in bytes. Absent means unlimited.
    pub max_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Log jobs that complete abruptly.
    pub log_errors: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        JobSettings { log_errors: true }
    }
}

/// Complete engine configuration.
///
/// Expected format:
/// ```toml
/// [engine]
/// dynamic_imports_allowed = true
///
/// [heap]
/// max_bytes = 67108864
///
/// [jobs]
/// log_errors = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSettings,
    pub heap: HeapSettings,
    pub jobs: JobSettings,
}

impl EngineConfig {
    /// Parse configuration from TOML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn heap_config(&self) -> HeapConfig {
        match self.heap.max_bytes {
            Some(max) => HeapConfig::with_limit(max),
            None => HeapConfig::unlimited(),
        }
    }
}
