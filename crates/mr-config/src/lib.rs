#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DATABASES: usize = 16;
pub const MAX_DATABASES: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("databases must be between 1 and 4096, got {0}")]
    DatabaseCount(usize),
}

/// Per-client engine settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Emit a `tracing` debug event for every dispatched command.
    pub debug: bool,
    /// Answer unsupported commands with a null reply instead of an error.
    pub bypass_unsupported: bool,
    pub databases: usize,
    /// Seed for `SPOP`/`SRANDMEMBER`/`RANDOMKEY`. Entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            bypass_unsupported: false,
            databases: DEFAULT_DATABASES,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DATABASES).contains(&self.databases) {
            return Err(ConfigError::DatabaseCount(self.databases));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_bypass_unsupported(mut self, bypass: bool) -> Self {
        self.bypass_unsupported = bypass;
        self
    }

    #[must_use]
    pub fn with_databases(mut self, databases: usize) -> Self {
        self.databases = databases;
        self
    }

    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
