/// Read/query HTTP API over the stores, plus manual sync triggers
pub mod error;
pub mod handlers;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/tokens", post(handlers::add_token).get(handlers::list_tokens))
        .route("/tokens/{id}", get(handlers::get_token))
        .route("/tokens/{id}/refresh", post(handlers::refresh_token))
        .route("/search", get(handlers::search_tokens))
        .route("/sync", post(handlers::sync_now))
        .route("/sync/status", get(handlers::sync_status))
        .route("/history/{id}", get(handlers::price_history))
        .route("/analytics", get(handlers::analytics));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::{Result, SyncError};
    use crate::feed::MarketFeed;
    use crate::store::{IndexStore, RecordStore, SqliteRecordStore};
    use crate::sync::SyncEngine;
    use crate::types::{MarketAnalytics, TokenSnapshot, TopToken};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    fn token(id: &str, symbol: &str, price: f64, market_cap: f64) -> TokenSnapshot {
        TokenSnapshot {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: id[..1].to_uppercase() + &id[1..],
            current_price: price,
            market_cap,
            volume_24h: 1_000.0,
            updated_at: Utc::now(),
        }
    }

    struct FakeFeed {
        tokens: Vec<TokenSnapshot>,
        fail: bool,
        last_limit: AtomicUsize,
    }

    #[async_trait]
    impl MarketFeed for FakeFeed {
        async fn fetch_top_tokens(&self, limit: usize) -> Result<Vec<TokenSnapshot>> {
            self.last_limit.store(limit, Ordering::SeqCst);
            if self.fail {
                return Err(SyncError::UpstreamError {
                    status: 500,
                    body: "internal error".to_string(),
                });
            }
            Ok(self.tokens.iter().take(limit).cloned().collect())
        }

        async fn fetch_token(&self, id: &str) -> Result<TokenSnapshot> {
            self.tokens
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| SyncError::TokenNotFound(id.to_string()))
        }
    }

    #[derive(Default)]
    struct FakeIndex {
        docs: Mutex<HashMap<String, TokenSnapshot>>,
    }

    #[async_trait]
    impl IndexStore for FakeIndex {
        async fn index_snapshot(&self, snapshot: &TokenSnapshot) -> Result<()> {
            self.docs
                .lock()
                .unwrap()
                .insert(snapshot.id.clone(), snapshot.clone());
            Ok(())
        }

        async fn search(&self, query: &str) -> Result<Vec<TokenSnapshot>> {
            let q = query.to_lowercase();
            Ok(self
                .docs
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.name.to_lowercase().contains(&q) || t.symbol.to_lowercase().contains(&q))
                .cloned()
                .collect())
        }

        async fn analytics(&self) -> Result<MarketAnalytics> {
            let docs = self.docs.lock().unwrap();
            let total: f64 = docs.values().map(|t| t.market_cap).sum();
            let avg = if docs.is_empty() {
                None
            } else {
                Some(docs.values().map(|t| t.current_price).sum::<f64>() / docs.len() as f64)
            };
            Ok(MarketAnalytics {
                avg_price: avg,
                total_market_cap: total,
                top_tokens: docs
                    .values()
                    .map(|t| TopToken {
                        symbol: t.symbol.clone(),
                        market_cap: t.market_cap,
                    })
                    .collect(),
            })
        }
    }

    struct TestApp {
        router: Router,
        feed: Arc<FakeFeed>,
        index: Arc<FakeIndex>,
    }

    fn app_with(fail_feed: bool) -> TestApp {
        let feed = Arc::new(FakeFeed {
            tokens: vec![
                token("bitcoin", "btc", 60_000.0, 1.2e12),
                token("ethereum", "eth", 3_000.0, 3.6e11),
                token("solana", "sol", 150.0, 7.0e10),
            ],
            fail: fail_feed,
            last_limit: AtomicUsize::new(0),
        });
        let records = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let index = Arc::new(FakeIndex::default());
        let engine = Arc::new(SyncEngine::new(
            feed.clone(),
            records.clone(),
            index.clone(),
            SyncConfig::default(),
        ));

        TestApp {
            router: create_router(AppState::new(records, index.clone(), engine)),
            feed,
            index,
        }
    }

    async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_with(false);
        let (status, body) = send(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_add_and_read_token() {
        let app = app_with(false);
        let payload = json!({
            "id": "dogecoin",
            "symbol": "doge",
            "name": "Dogecoin",
            "current_price": 0.12,
            "market_cap": 1.7e10,
            "volume_24h": 5.0e8
        });

        let (status, body) = send(&app, "POST", "/api/v1/tokens", Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "dogecoin");
        assert!(app.index.docs.lock().unwrap().contains_key("dogecoin"));

        let (status, body) = send(&app, "GET", "/api/v1/tokens/dogecoin", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "doge");

        let (status, body) = send(&app, "GET", "/api/v1/tokens", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_add_token_requires_id() {
        let app = app_with(false);
        let payload = json!({"id": "  ", "symbol": "x", "name": "X"});

        let (status, body) = send(&app, "POST", "/api/v1/tokens", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_missing_token_is_404() {
        let app = app_with(false);
        let (status, body) = send(&app, "GET", "/api/v1/tokens/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_sync_then_query() {
        let app = app_with(false);

        let (status, body) = send(&app, "POST", "/api/v1/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Sync completed");
        assert_eq!(body["synced"], 3);
        assert_eq!(body["total"], 3);
        assert_eq!(app.feed.last_limit.load(Ordering::SeqCst), 10);

        let (status, body) = send(&app, "GET", "/api/v1/search?q=btc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["id"], "bitcoin");

        let (status, body) = send(&app, "GET", "/api/v1/history/ethereum", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["history"][0]["price"], 3_000.0);

        let (status, body) = send(&app, "GET", "/api/v1/analytics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["top_tokens"].as_array().unwrap().len(), 3);

        let (_, body) = send(&app, "GET", "/api/v1/tokens", None).await;
        assert_eq!(body["tokens"][0]["id"], "bitcoin");
    }

    #[tokio::test]
    async fn test_sync_limit_is_clamped() {
        let app = app_with(false);

        send(&app, "POST", "/api/v1/sync?limit=1000", None).await;
        assert_eq!(app.feed.last_limit.load(Ordering::SeqCst), 250);

        let (_, body) = send(&app, "POST", "/api/v1/sync?limit=0", None).await;
        assert_eq!(app.feed.last_limit.load(Ordering::SeqCst), 1);
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_sync_feed_failure_is_bad_gateway() {
        let app = app_with(true);
        let (status, body) = send(&app, "POST", "/api/v1/sync", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let app = app_with(false);
        let (status, _) = send(&app, "GET", "/api/v1/search", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/v1/search?q=", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_history_is_404() {
        let app = app_with(false);
        let (status, _) = send(&app, "GET", "/api/v1/history/bitcoin", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_token() {
        let app = app_with(false);

        let (status, body) = send(&app, "POST", "/api/v1/tokens/solana/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["synced"], 1);
        assert!(app.index.docs.lock().unwrap().contains_key("solana"));

        let (status, _) = send(&app, "POST", "/api/v1/tokens/unknown/refresh", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_manual_sync_does_not_touch_scheduler_status() {
        let app = app_with(false);
        send(&app, "POST", "/api/v1/sync", None).await;

        let (status, body) = send(&app, "GET", "/api/v1/sync/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["cycles_completed"], 0);
        assert!(body["last_report"].is_null());
    }
}
