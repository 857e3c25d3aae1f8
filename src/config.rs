//! Configuration management for hashchain

use crate::blockchain::{BlockLayout, ValidationPolicy, DEFAULT_DATA_SIZE};
use crate::crypto::HashAlgorithm;
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "hashchain.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub bench: BenchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_data_size")]
    pub data_size: usize,
    #[serde(default)]
    pub hash: HashAlgorithm,
    #[serde(default = "default_enabled")]
    pub trust_genesis: bool,
    #[serde(default = "default_enabled")]
    pub strict_length: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            data_size: default_data_size(),
            hash: HashAlgorithm::default(),
            trust_genesis: true,
            strict_length: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_min_blocks_per_worker")]
    pub min_blocks_per_worker: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            min_blocks_per_worker: default_min_blocks_per_worker(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_blocks")]
    pub blocks: usize,
    /// Seeds a reproducible generator; without it payloads come from the OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            blocks: default_blocks(),
            seed: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chain.data_size == 0 {
            return Err(ChainError::Config(
                "chain.data_size must be greater than zero".to_string(),
            ));
        }
        if self.verify.threads == 0 {
            return Err(ChainError::Config(
                "verify.threads must be greater than zero".to_string(),
            ));
        }
        if self.verify.min_blocks_per_worker == 0 {
            return Err(ChainError::Config(
                "verify.min_blocks_per_worker must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<BlockLayout> {
        BlockLayout::new(self.chain.data_size, self.chain.hash)
    }

    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            trust_genesis: self.chain.trust_genesis,
            strict_length: self.chain.strict_length,
            threads: self.verify.threads,
            min_blocks_per_worker: self.verify.min_blocks_per_worker,
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}

/// Loads `hashchain.toml` from the working directory.
pub fn load_config() -> Result<Config> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads a config file, falling back to defaults when it does not exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(config_str) => parse_config(&config_str),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn default_data_size() -> usize {
    DEFAULT_DATA_SIZE
}

fn default_enabled() -> bool {
    true
}

fn default_threads() -> usize {
    1
}

fn default_min_blocks_per_worker() -> usize {
    1024
}

fn default_blocks() -> usize {
    1_000_000
}
