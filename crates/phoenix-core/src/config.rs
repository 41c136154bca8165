//! Workspace configuration schema and loader.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoenixConfig {
    /// Location of the selector table.
    pub selectors_path: PathBuf,
    /// Bounded wait for one element match, in milliseconds.
    pub match_timeout_ms: u64,
    pub oracle: OracleConfig,
}

impl Default for PhoenixConfig {
    fn default() -> Self {
        Self {
            selectors_path: PathBuf::from("config/selectors.json"),
            match_timeout_ms: 5_000,
            oracle: OracleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub model: String,
    pub endpoint: String,
    /// Upper bound on one proposal round-trip, in seconds.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: crate::oracle::gemini::DEFAULT_MODEL.to_string(),
            endpoint: crate::oracle::gemini::DEFAULT_ENDPOINT.to_string(),
            timeout_secs: crate::oracle::gemini::DEFAULT_TIMEOUT_SECS,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./phoenix.yaml
    /// 2. ~/.phoenix/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<PhoenixConfig, ConfigError> {
        let local_config = PathBuf::from("./phoenix.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".phoenix").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(PhoenixConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<PhoenixConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: PhoenixConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
