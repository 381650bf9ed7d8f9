pub mod coingecko;

pub use coingecko::CoinGeckoClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::TokenSnapshot;

/// Source of current token market data
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Top `limit` tokens, ordered by descending market cap as reported upstream
    async fn fetch_top_tokens(&self, limit: usize) -> Result<Vec<TokenSnapshot>>;

    /// A single token by provider id
    async fn fetch_token(&self, id: &str) -> Result<TokenSnapshot>;
}
