use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::error::AppError;
use super::state::AppState;
use crate::config::loader::MAX_BATCH_SIZE;
use crate::sync::{CycleReport, EngineStatus};
use crate::types::{MarketAnalytics, TokenSnapshot};

const DEFAULT_SYNC_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct NewToken {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub volume_24h: f64,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

/// Manually register a token; written to the record store first, then the index
pub async fn add_token(
    State(state): State<AppState>,
    Json(payload): Json<NewToken>,
) -> Result<(StatusCode, Json<TokenSnapshot>), AppError> {
    let id = payload.id.trim();
    if id.is_empty() {
        return Err(AppError::BadRequest("Token id is required".into()));
    }

    let snapshot = TokenSnapshot {
        id: id.to_string(),
        symbol: payload.symbol,
        name: payload.name,
        current_price: payload.current_price,
        market_cap: payload.market_cap,
        volume_24h: payload.volume_24h,
        updated_at: Utc::now(),
    };

    state.records.upsert_snapshot(&snapshot).await?;
    state.index.index_snapshot(&snapshot).await?;

    info!("✅ Token added: {}", snapshot.id);
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn list_tokens(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let tokens = state.records.list_snapshots().await?;
    Ok(Json(json!({
        "count": tokens.len(),
        "tokens": tokens,
    })))
}

pub async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TokenSnapshot>, AppError> {
    state
        .records
        .get_snapshot(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Token not found: {}", id)))
}

pub async fn search_tokens(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let query = params.q.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("Query parameter 'q' is required".into()));
    }

    let results = state.index.search(query).await?;
    Ok(Json(json!({
        "query": query,
        "count": results.len(),
        "results": results,
    })))
}

/// Run one cycle immediately, outside the schedule
pub async fn sync_now(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Value>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SYNC_LIMIT)
        .clamp(1, MAX_BATCH_SIZE);

    let report = state.engine.run_cycle(limit).await;
    if let Some(err) = report.fetch_error {
        return Err(AppError::BadGateway(err));
    }

    Ok(Json(json!({
        "message": "Sync completed",
        "synced": report.synced,
        "total": report.fetched,
        "failures": report.failures,
    })))
}

pub async fn sync_status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.engine.status().await)
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CycleReport>, AppError> {
    let report = state.engine.sync_token(&id).await?;
    Ok(Json(report))
}

pub async fn price_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Value>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);

    let history = state.records.price_history(&id, limit).await?;
    if history.is_empty() {
        return Err(AppError::NotFound(format!("No price history for {}", id)));
    }

    Ok(Json(json!({
        "token_id": id,
        "count": history.len(),
        "history": history,
    })))
}

pub async fn analytics(State(state): State<AppState>) -> Result<Json<MarketAnalytics>, AppError> {
    Ok(Json(state.index.analytics().await?))
}
