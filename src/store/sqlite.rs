/// SQLite-backed record store: `tokens` (upsert by id) + `price_history` (append-only)
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::RecordStore;
use crate::error::{Result, SyncError};
use crate::types::{PriceHistoryPoint, TokenSnapshot};

const STORE: &str = "record store";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tokens (
        id TEXT PRIMARY KEY,
        symbol TEXT NOT NULL,
        name TEXT NOT NULL,
        current_price REAL NOT NULL,
        market_cap REAL NOT NULL,
        volume_24h REAL NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS price_history (
        token_id TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        price REAL NOT NULL,
        PRIMARY KEY (token_id, timestamp)
    );
    CREATE INDEX IF NOT EXISTS idx_price_history_token_ts
        ON price_history(token_id, timestamp DESC);
";

pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the database file and bootstrap the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| SyncError::SchemaError(format!("Failed to open {}: {}", path.display(), e)))?;

        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| SyncError::SchemaError(format!("Failed to enable WAL: {}", e)))?;
        debug!("SQLite journal mode: {}", mode);

        let store = Self::from_connection(conn)?;
        info!("✅ Record store ready at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::SchemaError(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| SyncError::SchemaError(format!("Failed to create tables: {}", e)))?;

        Ok(SqliteRecordStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a statement on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> std::result::Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| "connection mutex poisoned".to_string())?;
            f(&guard).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("blocking task failed: {}", e))?
    }
}

fn from_micros(micros: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, micros))
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<TokenSnapshot> {
    Ok(TokenSnapshot {
        id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        current_price: row.get(3)?,
        market_cap: row.get(4)?,
        volume_24h: row.get(5)?,
        updated_at: from_micros(row.get(6)?, 6)?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn upsert_snapshot(&self, snapshot: &TokenSnapshot) -> Result<()> {
        let s = snapshot.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tokens (id, symbol, name, current_price, market_cap, volume_24h, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    symbol = excluded.symbol,
                    name = excluded.name,
                    current_price = excluded.current_price,
                    market_cap = excluded.market_cap,
                    volume_24h = excluded.volume_24h,
                    updated_at = excluded.updated_at",
                params![
                    s.id,
                    s.symbol,
                    s.name,
                    s.current_price,
                    s.market_cap,
                    s.volume_24h,
                    s.updated_at.timestamp_micros(),
                ],
            )
        })
        .await
        .map(|_| ())
        .map_err(|e| SyncError::write(STORE, e))
    }

    async fn append_history_point(&self, point: &PriceHistoryPoint) -> Result<()> {
        let p = point.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO price_history (token_id, timestamp, price) VALUES (?1, ?2, ?3)",
                params![p.token_id, p.timestamp.timestamp_micros(), p.price],
            )
        })
        .await
        .map(|_| ())
        .map_err(|e| SyncError::write(STORE, e))
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<TokenSnapshot>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, symbol, name, current_price, market_cap, volume_24h, updated_at
                 FROM tokens WHERE id = ?1",
                params![id],
                snapshot_from_row,
            )
            .optional()
        })
        .await
        .map_err(|e| SyncError::read(STORE, e))
    }

    async fn list_snapshots(&self) -> Result<Vec<TokenSnapshot>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, symbol, name, current_price, market_cap, volume_24h, updated_at
                 FROM tokens ORDER BY market_cap DESC",
            )?;
            let rows = stmt.query_map([], snapshot_from_row)?;
            rows.collect()
        })
        .await
        .map_err(|e| SyncError::read(STORE, e))
    }

    async fn price_history(&self, token_id: &str, limit: usize) -> Result<Vec<PriceHistoryPoint>> {
        let token_id = token_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT token_id, timestamp, price FROM price_history
                 WHERE token_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![token_id, limit], |row| {
                Ok(PriceHistoryPoint {
                    token_id: row.get(0)?,
                    timestamp: from_micros(row.get(1)?, 1)?,
                    price: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(|e| SyncError::read(STORE, e))
    }
}
