/// Core type definitions for the sync service
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest known market state of one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub updated_at: DateTime<Utc>,
}

/// One immutable price observation, keyed by (token_id, timestamp)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryPoint {
    pub token_id: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PriceHistoryPoint {
    pub fn new(token_id: impl Into<String>, timestamp: DateTime<Utc>, price: f64) -> Self {
        PriceHistoryPoint {
            token_id: token_id.into(),
            timestamp,
            price,
        }
    }

    /// History point recording a snapshot's price at `timestamp`
    pub fn from_snapshot(snapshot: &TokenSnapshot, timestamp: DateTime<Utc>) -> Self {
        Self::new(snapshot.id.clone(), timestamp, snapshot.current_price)
    }
}

/// Aggregated view over the indexed snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalytics {
    pub avg_price: Option<f64>,
    pub total_market_cap: f64,
    pub top_tokens: Vec<TopToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopToken {
    pub symbol: String,
    pub market_cap: f64,
}
