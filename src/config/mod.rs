pub mod loader;

pub use loader::load_config;

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the sync service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub sync: SyncConfig,
    pub record_store: RecordStoreConfig,
    pub index_store: IndexStoreConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            timeout_secs: 10,
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub batch_size: usize,
    pub sync_on_startup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            interval_secs: 60,
            batch_size: 10,
            sync_on_startup: true,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordStoreConfig {
    pub path: String,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        RecordStoreConfig {
            path: "data/tokensync.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexStoreConfig {
    pub url: String,
    pub index_name: String,
}

impl Default for IndexStoreConfig {
    fn default() -> Self {
        IndexStoreConfig {
            url: "http://localhost:9200".to_string(),
            index_name: "crypto_tokens".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "tokensync=debug,info".to_string(),
            json: false,
        }
    }
}
