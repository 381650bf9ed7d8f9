/// Configuration loading: optional TOML file layered under TOKENSYNC__* env vars
use std::net::SocketAddr;
use std::path::Path;

use config::{Environment, File, FileFormat};

use super::Config;
use crate::error::{Result, SyncError};

/// Largest page the feed provider serves in one request
pub const MAX_BATCH_SIZE: usize = 250;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref().to_string_lossy().to_string();

    let settings = config::Config::builder()
        .add_source(File::new(&path, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("TOKENSYNC")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| SyncError::ConfigError(format!("Failed to read config: {}", e)))?;

    let config: Config = settings
        .try_deserialize()
        .map_err(|e| SyncError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.feed.base_url.trim().is_empty() {
        return Err(SyncError::ConfigError("feed.base_url is empty".to_string()));
    }

    if config.feed.timeout_secs == 0 {
        return Err(SyncError::ConfigError("feed.timeout_secs must be >= 1".to_string()));
    }

    if config.sync.interval_secs == 0 {
        return Err(SyncError::ConfigError("sync.interval_secs must be >= 1".to_string()));
    }

    if config.sync.batch_size == 0 || config.sync.batch_size > MAX_BATCH_SIZE {
        return Err(SyncError::ConfigError(format!(
            "Invalid sync.batch_size: {} (expected 1..={})",
            config.sync.batch_size, MAX_BATCH_SIZE
        )));
    }

    if config.index_store.index_name.trim().is_empty() {
        return Err(SyncError::ConfigError("index_store.index_name is empty".to_string()));
    }

    config
        .server
        .bind_addr
        .parse::<SocketAddr>()
        .map_err(|e| {
            SyncError::ConfigError(format!(
                "Invalid server.bind_addr '{}': {}",
                config.server.bind_addr, e
            ))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config("does/not/exist.toml").unwrap();

        assert_eq!(config.sync.interval_secs, 60);
        assert_eq!(config.sync.batch_size, 10);
        assert!(config.sync.sync_on_startup);
        assert_eq!(config.feed.timeout_secs, 10);
        assert_eq!(config.index_store.index_name, "crypto_tokens");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[sync]\ninterval_secs = 15\nbatch_size = 25\n\n[index_store]\nindex_name = \"tokens_test\""
        )
        .unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.sync.interval_secs, 15);
        assert_eq!(config.sync.batch_size, 25);
        assert_eq!(config.index_store.index_name, "tokens_test");
        // Untouched sections keep their defaults
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.sync.batch_size = MAX_BATCH_SIZE + 1;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.sync.interval_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.server.bind_addr = "not-an-addr".to_string();
        assert!(validate_config(&config).is_err());

        assert!(validate_config(&Config::default()).is_ok());
    }
}
