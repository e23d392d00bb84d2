//! Configuration for the ledger service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Identity that initializes the ledger and holds the administrator role
    pub administrator: String,

    /// Data directory for the journal
    pub data_dir: PathBuf,

    /// Actor mailbox capacity (pending calls before callers wait)
    pub mailbox_capacity: usize,

    /// Journal storage configuration
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "invoice-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            administrator: "admin".to_string(),
            data_dir: PathBuf::from("./data/ledger"),
            mailbox_capacity: 1000,
            storage: StorageConfig::default(),
        }
    }
}

/// Journal storage configuration (RocksDB)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persist the journal; when false the ledger lives in memory only
    pub enabled: bool,

    /// fsync every committed event before acknowledging it
    pub sync_writes: bool,

    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_writes: true,
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(admin) = std::env::var("LEDGER_ADMIN") {
            config.administrator = admin;
        }

        if let Ok(persist) = std::env::var("LEDGER_PERSIST") {
            config.storage.enabled = parse_flag(&persist)?;
        }

        if let Ok(capacity) = std::env::var("LEDGER_MAILBOX_CAPACITY") {
            config.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.administrator.trim().is_empty() {
            return Err(crate::Error::Config("administrator must not be empty".to_string()));
        }
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::Error::Config(format!("Invalid LEDGER_PERSIST: {}", other))),
    }
}
