/// Per-cycle bookkeeping for the sync engine
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Write step of the per-token propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    Snapshot,
    Index,
    History,
}

impl SyncStep {
    pub fn as_str(&self) -> &str {
        match self {
            SyncStep::Snapshot => "snapshot",
            SyncStep::Index => "index",
            SyncStep::History => "history",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenFailure {
    pub token_id: String,
    pub step: SyncStep,
    pub error: String,
}

/// Outcome of one fetch-then-propagate pass
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Tokens returned by the feed
    pub fetched: usize,
    /// Tokens that completed all three writes
    pub synced: usize,
    pub fetch_error: Option<String>,
    pub failures: Vec<TokenFailure>,
}

impl CycleReport {
    pub fn fetch_failed(started_at: DateTime<Utc>, error: String) -> Self {
        CycleReport {
            started_at,
            finished_at: Utc::now(),
            fetched: 0,
            synced: 0,
            fetch_error: Some(error),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fetch_error.is_none() && self.synced == self.fetched
    }

    pub fn failures_for(&self, token_id: &str) -> Vec<&TokenFailure> {
        self.failures.iter().filter(|f| f.token_id == token_id).collect()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} synced", self.synced, self.fetched)
    }
}
