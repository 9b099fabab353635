// Configuration
// Settings for logging and metadata caches, read from YAML with environment overrides

use crate::cache::CacheConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the branch metadata cache size
pub const BRANCH_CACHE_SIZE_ENV: &str = "BRANCH_METADATA_CACHE_MAX_SIZE";

/// Environment variable overriding the pull request metadata cache size
pub const PR_CACHE_SIZE_ENV: &str = "PR_METADATA_CACHE_MAX_SIZE";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: String, value: String },
}

/// Metadata cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    pub branch_metadata_max_size: usize,
    pub pull_request_metadata_max_size: usize,
    pub expire_after_access_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            branch_metadata_max_size: 10_000,
            pull_request_metadata_max_size: 10_000,
            expire_after_access_secs: 24 * 60 * 60,
        }
    }
}

impl CacheSettings {
    pub fn branch_cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.branch_metadata_max_size,
            expire_after_access: Duration::from_secs(self.expire_after_access_secs),
        }
    }

    pub fn pull_request_cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.pull_request_metadata_max_size,
            expire_after_access: Duration::from_secs(self.expire_after_access_secs),
        }
    }
}

/// Library and CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    /// Default log filter, e.g. `info` or `pipeline_graph=debug`
    pub log_level: Option<String>,
    pub cache: CacheSettings,
}

impl GraphConfig {
    /// Default location: `<config dir>/pipeline-graph/config.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pipeline-graph")
            .join("config.yaml")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Config from `path`, or from the default location when it exists.
    /// Environment overrides are applied last.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply cache size overrides from the environment
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = parse_env(&lookup, BRANCH_CACHE_SIZE_ENV)? {
            self.cache.branch_metadata_max_size = size;
        }
        if let Some(size) = parse_env(&lookup, PR_CACHE_SIZE_ENV)? {
            self.cache.pull_request_metadata_max_size = size;
        }
        Ok(())
    }
}

fn parse_env<F>(lookup: &F, name: &str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv {
            name: name.to_string(),
            value,
        })
}
