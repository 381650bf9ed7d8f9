/// CoinGecko REST client for market data
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::MarketFeed;
use crate::config::FeedConfig;
use crate::error::{Result, SyncError};
use crate::types::TokenSnapshot;

#[derive(Debug, Deserialize)]
struct MarketEntry {
    id: String,
    symbol: String,
    name: String,
    // Thinly traded coins come back with nulls
    current_price: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
}

impl MarketEntry {
    fn into_snapshot(self, fetched_at: chrono::DateTime<Utc>) -> TokenSnapshot {
        TokenSnapshot {
            id: self.id,
            symbol: self.symbol,
            name: self.name,
            current_price: self.current_price.unwrap_or(0.0),
            market_cap: self.market_cap.unwrap_or(0.0),
            volume_24h: self.total_volume.unwrap_or(0.0),
            updated_at: fetched_at,
        }
    }
}

/// CoinGecko `/coins/markets` client
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(CoinGeckoClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Single GET on `/coins/markets` returning decoded market entries
    async fn get_markets(&self, params: &[(&str, &str)]) -> Result<Vec<MarketEntry>> {
        let url = format!("{}/coins/markets", self.base_url);
        debug!("Fetching markets: {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::UpstreamUnavailable(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(SyncError::UpstreamError {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SyncError::DecodeError(e.to_string()))
    }
}

#[async_trait]
impl MarketFeed for CoinGeckoClient {
    async fn fetch_top_tokens(&self, limit: usize) -> Result<Vec<TokenSnapshot>> {
        let per_page = limit.to_string();
        let entries = self
            .get_markets(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
                ("sparkline", "false"),
            ])
            .await?;
        let fetched_at = Utc::now();

        let tokens: Vec<TokenSnapshot> = entries
            .into_iter()
            .take(limit)
            .map(|entry| entry.into_snapshot(fetched_at))
            .collect();

        debug!("Fetched {} tokens", tokens.len());
        Ok(tokens)
    }

    async fn fetch_token(&self, id: &str) -> Result<TokenSnapshot> {
        let entry = self
            .get_markets(&[("vs_currency", "usd"), ("ids", id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::TokenNotFound(id.to_string()))?;

        Ok(entry.into_snapshot(Utc::now()))
    }
}
