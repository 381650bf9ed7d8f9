/// Centralized error types for the sync service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    // Feed Errors
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream error: status {status} - {body}")]
    UpstreamError { status: u16, body: String },

    #[error("Decode failed: {0}")]
    DecodeError(String),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    // Store Errors
    #[error("{store} write failed: {message}")]
    WriteError { store: &'static str, message: String },

    #[error("{store} read failed: {message}")]
    ReadError { store: &'static str, message: String },

    #[error("Schema initialization failed: {0}")]
    SchemaError(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn write(store: &'static str, err: impl std::fmt::Display) -> Self {
        SyncError::WriteError {
            store,
            message: err.to_string(),
        }
    }

    pub fn read(store: &'static str, err: impl std::fmt::Display) -> Self {
        SyncError::ReadError {
            store,
            message: err.to_string(),
        }
    }

    /// Errors raised while acquiring a batch from the price feed
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SyncError::UpstreamUnavailable(_)
                | SyncError::UpstreamError { .. }
                | SyncError::DecodeError(_)
                | SyncError::TokenNotFound(_)
        )
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            SyncError::UpstreamUnavailable(_) => "FEED_001",
            SyncError::UpstreamError { .. } => "FEED_002",
            SyncError::DecodeError(_) => "FEED_003",
            SyncError::TokenNotFound(_) => "FEED_004",
            SyncError::WriteError { .. } => "STORE_001",
            SyncError::ReadError { .. } => "STORE_002",
            SyncError::SchemaError(_) => "STORE_003",
            SyncError::ConfigError(_) => "CFG_001",
            SyncError::FileError(_) => "FILE_001",
        }
    }
}
