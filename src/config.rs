//! Configuration for the ledger and its proof of work

use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::path::Path;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Chain-level settings
///
/// `transactions_per_block` and the hash range are recorded on the chain but
/// no operation consults them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_transactions_per_block")]
    pub transactions_per_block: usize,
    #[serde(default)]
    pub hash_range_min: u64,
    #[serde(default = "default_hash_range_max")]
    pub hash_range_max: u64,
    #[serde(default)]
    pub mining: MiningConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MiningConfig {
    #[serde(default = "default_target_prefix")]
    pub target_prefix: String,
    /// Unbounded search when absent
    #[serde(default)]
    pub max_iterations: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            transactions_per_block: default_transactions_per_block(),
            hash_range_min: 0,
            hash_range_max: default_hash_range_max(),
            mining: MiningConfig::default(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            target_prefix: default_target_prefix(),
            max_iterations: None,
        }
    }
}

fn default_transactions_per_block() -> usize {
    4
}

fn default_hash_range_max() -> u64 {
    1000
}

fn default_target_prefix() -> String {
    "0000".to_string()
}

impl ChainConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_range_min > self.hash_range_max {
            return Err(ConfigError::Invalid(format!(
                "hash_range_min ({}) is greater than hash_range_max ({})",
                self.hash_range_min, self.hash_range_max
            )));
        }

        // digests are lowercase hex, so anything else can never match
        if !self
            .mining
            .target_prefix
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(ConfigError::Invalid(format!(
                "target_prefix {:?} is not lowercase hex",
                self.mining.target_prefix
            )));
        }

        Ok(())
    }
}
