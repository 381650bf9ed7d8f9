pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod store;
pub mod sync;
pub mod types;

pub use config::Config;
pub use error::{Result, SyncError};
pub use types::*;
