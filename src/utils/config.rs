use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::crypto::DEFAULT_PLAINTEXT_BITS;
use crate::dht::PrivateDhtConfig;
use std::time::Duration;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node name
    pub node_name: String,

    /// Identity keypair path
    pub identity_path: PathBuf,

    /// Data directory for the persistent overlay
    pub data_dir: PathBuf,

    /// Listen port announced to peers
    pub listen_port: u16,

    /// Bit length of the homomorphic plaintext space
    pub plaintext_bits: u32,

    /// Proof worker count; 0 sizes to available cores
    pub proof_workers: usize,

    /// Proof generation budget in seconds
    pub proof_timeout_secs: u64,

    /// Verification cache entry lifetime in seconds
    pub cache_ttl_secs: u64,

    /// Verification cache capacity
    pub cache_capacity: usize,

    /// Stored record lifetime in seconds
    pub record_ttl_secs: u64,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: "VeilDHT Node".to_string(),
            identity_path: PathBuf::from("identity.json"),
            data_dir: PathBuf::from("veil_dht_data"),
            listen_port: 6881,
            plaintext_bits: DEFAULT_PLAINTEXT_BITS,
            proof_workers: 0,
            proof_timeout_secs: 30,
            cache_ttl_secs: 300,
            cache_capacity: 1024,
            record_ttl_secs: 86400, // 24 hours
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file, falling back to defaults
    /// if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Saves configuration to a JSON file, creating parent directories
    /// as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Derives the façade configuration from the application settings.
    pub fn dht_config(&self) -> PrivateDhtConfig {
        PrivateDhtConfig {
            proof_workers: self.proof_workers,
            proof_timeout: Duration::from_secs(self.proof_timeout_secs),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            cache_capacity: self.cache_capacity,
        }
    }

    /// Stored record lifetime.
    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }
}
