//! Orchestrator configuration.
//!
//! Small on purpose: the runtime environment (which decides how malformed
//! contracts are treated), where contract documents live, and the default
//! batch options handed to node implementations.

use crate::core::batch::BatchOptions;
use crate::core::error::BatchError;
use crate::plugin::ContractPolicy;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const ENV_ENVIRONMENT: &str = "RAGWEAVE_ENV";
pub const ENV_CONTRACTS_DIR: &str = "RAGWEAVE_CONTRACTS_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown environment '{0}'; expected development or production")]
    UnknownEnvironment(String),

    #[error("Invalid batch options: {0}")]
    Batch(#[from] BatchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Development fails fast on a malformed contract; production logs and
    /// skips it.
    pub fn contract_policy(&self) -> ContractPolicy {
        match self {
            Environment::Development => ContractPolicy::Strict,
            Environment::Production => ContractPolicy::Lenient,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub environment: Environment,
    /// Directory holding `<category>.json` contract documents. When unset the
    /// builtin contracts are used.
    pub contracts_dir: Option<PathBuf>,
    pub batch: BatchOptions,
}

impl OrchestratorConfig {
    /// Reads `RAGWEAVE_ENV` and `RAGWEAVE_CONTRACTS_DIR`; anything unset keeps
    /// its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(env) = lookup(ENV_ENVIRONMENT).filter(|v| !v.trim().is_empty()) {
            config.environment = env.parse()?;
        }
        if let Some(dir) = lookup(ENV_CONTRACTS_DIR).filter(|v| !v.trim().is_empty()) {
            config.contracts_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("Loaded {} config from {}", config.environment, path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch.check()?;
        Ok(())
    }
}
