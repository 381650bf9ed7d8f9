/// Elasticsearch REST client for the token index
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::IndexStore;
use crate::config::IndexStoreConfig;
use crate::error::{Result, SyncError};
use crate::types::{MarketAnalytics, TokenSnapshot, TopToken};

const STORE: &str = "index store";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: TokenSnapshot,
}

#[derive(Debug, Deserialize)]
struct AnalyticsResponse {
    aggregations: Aggregations,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    avg_price: MetricValue,
    total_market_cap: MetricValue,
    top_tokens: TermsBuckets,
}

#[derive(Debug, Deserialize)]
struct MetricValue {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TermsBuckets {
    buckets: Vec<TopTokenBucket>,
}

#[derive(Debug, Deserialize)]
struct TopTokenBucket {
    key: String,
    by_market_cap: MetricValue,
}

pub struct ElasticIndex {
    client: Client,
    base_url: String,
    index_name: String,
}

impl ElasticIndex {
    pub fn new(config: &IndexStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SyncError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ElasticIndex {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index_name)
    }

    /// `/{index}/_doc/{id}` with the id percent-encoded as a single path segment
    fn doc_url(&self, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.index_url())
            .map_err(|e| SyncError::write(STORE, format!("invalid index url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::write(STORE, "index url cannot carry a path"))?
            .pop_if_empty()
            .push("_doc")
            .push(id);
        Ok(url)
    }

    /// Check the cluster answers at all
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| SyncError::SchemaError(format!("Failed to connect to index store: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::SchemaError(format!(
                "Index store ping returned {}",
                response.status()
            )));
        }

        info!("✅ Connected to index store at {}", self.base_url);
        Ok(())
    }

    /// Create the index with its mapping unless it already exists
    pub async fn ensure_index(&self) -> Result<()> {
        let exists = self
            .client
            .head(self.index_url())
            .send()
            .await
            .map_err(|e| SyncError::SchemaError(format!("Failed to check index: {}", e)))?;

        if exists.status() == StatusCode::OK {
            info!("✅ Index '{}' already exists", self.index_name);
            return Ok(());
        }

        let mapping = json!({
            "mappings": {
                "properties": {
                    "id": {"type": "keyword"},
                    "symbol": {"type": "keyword"},
                    "name": {"type": "text"},
                    "current_price": {"type": "double"},
                    "market_cap": {"type": "double"},
                    "volume_24h": {"type": "double"},
                    "updated_at": {"type": "date"}
                }
            }
        });

        let response = self
            .client
            .put(self.index_url())
            .json(&mapping)
            .send()
            .await
            .map_err(|e| SyncError::SchemaError(format!("Failed to create index: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::SchemaError(format!(
                "Index creation returned {}: {}",
                status, body
            )));
        }

        info!("✅ Created index '{}'", self.index_name);
        Ok(())
    }

    async fn post_search<T: serde::de::DeserializeOwned>(&self, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/_search", self.index_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::read(STORE, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::read(STORE, format!("status {}: {}", status, text)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::read(STORE, format!("failed to decode response: {}", e)))
    }
}

#[async_trait]
impl IndexStore for ElasticIndex {
    async fn index_snapshot(&self, snapshot: &TokenSnapshot) -> Result<()> {
        let response = self
            .client
            .put(self.doc_url(&snapshot.id)?)
            .query(&[("refresh", "true")])
            .json(snapshot)
            .send()
            .await
            .map_err(|e| SyncError::write(STORE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::write(STORE, format!("status {}: {}", status, body)));
        }

        debug!("Indexed {}", snapshot.id);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<TokenSnapshot>> {
        let body = json!({
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["name", "symbol"]
                }
            }
        });

        let response: SearchResponse = self.post_search(body).await?;
        Ok(response.hits.hits.into_iter().map(|hit| hit.source).collect())
    }

    async fn analytics(&self) -> Result<MarketAnalytics> {
        let body = json!({
            "size": 0,
            "aggs": {
                "avg_price": {"avg": {"field": "current_price"}},
                "total_market_cap": {"sum": {"field": "market_cap"}},
                "top_tokens": {
                    "terms": {
                        "field": "symbol",
                        "size": 10,
                        "order": {"by_market_cap": "desc"}
                    },
                    "aggs": {
                        "by_market_cap": {"max": {"field": "market_cap"}}
                    }
                }
            }
        });

        let response: AnalyticsResponse = self.post_search(body).await?;
        let aggs = response.aggregations;

        Ok(MarketAnalytics {
            avg_price: aggs.avg_price.value,
            total_market_cap: aggs.total_market_cap.value.unwrap_or(0.0),
            top_tokens: aggs
                .top_tokens
                .buckets
                .into_iter()
                .map(|bucket| TopToken {
                    symbol: bucket.key,
                    market_cap: bucket.by_market_cap.value.unwrap_or(0.0),
                })
                .collect(),
        })
    }
}
