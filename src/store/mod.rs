pub mod elastic;
pub mod sqlite;

pub use elastic::ElasticIndex;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MarketAnalytics, PriceHistoryPoint, TokenSnapshot};

/// Primary store: latest snapshot per token plus append-only price history
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite the snapshot keyed by `snapshot.id`
    async fn upsert_snapshot(&self, snapshot: &TokenSnapshot) -> Result<()>;

    /// Append one history point; existing points are never touched
    async fn append_history_point(&self, point: &PriceHistoryPoint) -> Result<()>;

    async fn get_snapshot(&self, id: &str) -> Result<Option<TokenSnapshot>>;

    async fn list_snapshots(&self) -> Result<Vec<TokenSnapshot>>;

    /// Newest first, at most `limit` points
    async fn price_history(&self, token_id: &str, limit: usize) -> Result<Vec<PriceHistoryPoint>>;
}

/// Secondary store: searchable copy of the latest snapshot per token
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert or overwrite the document keyed by `snapshot.id`
    async fn index_snapshot(&self, snapshot: &TokenSnapshot) -> Result<()>;

    /// Full-text match over name and symbol
    async fn search(&self, query: &str) -> Result<Vec<TokenSnapshot>>;

    async fn analytics(&self) -> Result<MarketAnalytics>;
}
