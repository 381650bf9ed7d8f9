/// Price sync engine
/// Periodically pulls the top tokens from the feed and propagates each one to
/// the record store, the index and the price history, isolating failures per token.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::report::{CycleReport, SyncStep, TokenFailure};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::feed::MarketFeed;
use crate::store::{IndexStore, RecordStore};
use crate::types::{PriceHistoryPoint, TokenSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Fetching,
    Propagating,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub cycles_completed: u64,
    pub last_report: Option<CycleReport>,
}

pub struct SyncEngine {
    feed: Arc<dyn MarketFeed>,
    records: Arc<dyn RecordStore>,
    index: Arc<dyn IndexStore>,
    config: SyncConfig,
    status: RwLock<EngineStatus>,
}

impl SyncEngine {
    pub fn new(
        feed: Arc<dyn MarketFeed>,
        records: Arc<dyn RecordStore>,
        index: Arc<dyn IndexStore>,
        config: SyncConfig,
    ) -> Self {
        SyncEngine {
            feed,
            records,
            index,
            config,
            status: RwLock::new(EngineStatus {
                state: EngineState::Idle,
                cycles_completed: 0,
                last_report: None,
            }),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub async fn status(&self) -> EngineStatus {
        self.status.read().await.clone()
    }

    async fn set_state(&self, state: EngineState) {
        self.status.write().await.state = state;
    }

    /// Run one cycle outside the schedule. Does not touch the scheduler's status.
    pub async fn run_cycle(&self, limit: usize) -> CycleReport {
        self.cycle(limit, false).await
    }

    /// Fetch one token by id and propagate it with the same per-token policy
    pub async fn sync_token(&self, id: &str) -> Result<CycleReport> {
        let cycle_ts = Utc::now();
        let token = self.feed.fetch_token(id).await?;
        Ok(self.propagate(cycle_ts, vec![token]).await)
    }

    async fn scheduled_cycle(&self) {
        let report = self.cycle(self.config.batch_size, true).await;

        let mut status = self.status.write().await;
        status.cycles_completed += 1;
        status.last_report = Some(report);
    }

    async fn cycle(&self, limit: usize, track: bool) -> CycleReport {
        let started_at = Utc::now();
        info!("📊 Syncing prices (batch of {})", limit);

        if track {
            self.set_state(EngineState::Fetching).await;
        }

        let tokens = match self.feed.fetch_top_tokens(limit).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("❌ Failed to fetch tokens: {} ({})", e, e.error_code());
                return CycleReport::fetch_failed(started_at, e.to_string());
            }
        };

        if track {
            self.set_state(EngineState::Propagating).await;
        }

        let report = self.propagate(started_at, tokens).await;
        if report.is_complete() {
            info!("✅ Synced {}", report);
        } else {
            warn!("⚠️  Synced {} ({} write failures)", report, report.failures.len());
        }
        report
    }

    /// Write each token in turn; one token's failures never stop the next token.
    /// `cycle_ts` is both the report's start time and the timestamp of every history point,
    /// so points stay unique per token per cycle.
    async fn propagate(&self, cycle_ts: DateTime<Utc>, tokens: Vec<TokenSnapshot>) -> CycleReport {
        let mut synced = 0;
        let mut failures = Vec::new();

        for token in &tokens {
            let token_failures = self.propagate_token(token, cycle_ts).await;
            if token_failures.is_empty() {
                synced += 1;
            }
            failures.extend(token_failures);
        }

        CycleReport {
            started_at: cycle_ts,
            finished_at: Utc::now(),
            fetched: tokens.len(),
            synced,
            fetch_error: None,
            failures,
        }
    }

    /// Snapshot, then index, then history.
    /// A failed upsert skips the token; a failed index write skips its history point.
    /// Nothing already written is rolled back.
    async fn propagate_token(&self, token: &TokenSnapshot, cycle_ts: DateTime<Utc>) -> Vec<TokenFailure> {
        let mut failures = Vec::new();

        if let Err(e) = self.records.upsert_snapshot(token).await {
            failures.push(Self::failure(token, SyncStep::Snapshot, e));
            return failures;
        }

        if let Err(e) = self.index.index_snapshot(token).await {
            failures.push(Self::failure(token, SyncStep::Index, e));
            return failures;
        }

        let point = PriceHistoryPoint::from_snapshot(token, cycle_ts);
        if let Err(e) = self.records.append_history_point(&point).await {
            failures.push(Self::failure(token, SyncStep::History, e));
        }

        failures
    }

    fn failure(token: &TokenSnapshot, step: SyncStep, err: SyncError) -> TokenFailure {
        error!(
            token = %token.id,
            step = step.as_str(),
            "❌ Failed to write {}: {} ({})",
            token.id,
            err,
            err.error_code()
        );
        TokenFailure {
            token_id: token.id.clone(),
            step,
            error: err.to_string(),
        }
    }

    /// Scheduler loop. Runs until the shutdown channel fires (or closes).
    /// Shutdown is only observed between cycles; an in-flight cycle always completes.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.config.interval();
        info!("🔄 Price sync worker started (interval: {:?})", interval);

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if self.config.sync_on_startup {
            self.scheduled_cycle().await;
        }

        loop {
            self.set_state(EngineState::Idle).await;

            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => self.scheduled_cycle().await,
            }
        }

        self.set_state(EngineState::Stopped).await;
        info!("🛑 Price sync worker stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
