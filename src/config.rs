//! Configuration management.
//!
//! Layered loading: struct defaults, then an optional TOML file, then
//! environment variables (highest priority) with the pattern
//! `TARCAP__<section>__<key>`, e.g. `TARCAP__ARCHIVE__SIZE_LIMIT=4.7G`.
//! The default file location is `config/tarcap.toml`, overridable via the
//! `TARCAP_CONFIG` environment variable.

use std::env;
use std::path::PathBuf;

use config::{Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimate::DEFAULT_BLOCK_LEN;
use crate::feed::FeedPolicy;
use crate::humanize::ByteSize;

const CONFIG_ENV_VAR: &str = "TARCAP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/tarcap.toml";
const ENV_PREFIX: &str = "TARCAP";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("archive.block_len must be nonzero")]
    ZeroBlockLen,
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub feed: FeedPolicy,
}

/// Archive session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    /// Hard upper bound on the finished archive size; absent = unlimited.
    pub size_limit: Option<ByteSize>,
    /// Output flush and padding granularity.
    #[serde(default = "default_block_len")]
    pub block_len: ByteSize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            size_limit: None,
            block_len: default_block_len(),
        }
    }
}

fn default_block_len() -> ByteSize {
    ByteSize(DEFAULT_BLOCK_LEN)
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(config_path)
    }

    /// Load configuration from a specific path plus environment overrides.
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if config_path.exists() {
            tracing::debug!("loading configuration from {}", config_path.display());
            builder = builder.add_source(File::from(config_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.archive.block_len.as_u64() == 0 {
            return Err(ValidationError::ZeroBlockLen);
        }
        Ok(())
    }
}
