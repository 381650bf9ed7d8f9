/// Main entry point for the token sync service
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use tokensync::{
    api::{create_router, AppState},
    config::load_config,
    feed::CoinGeckoClient,
    logging::init_logging,
    store::{ElasticIndex, SqliteRecordStore},
    sync::SyncEngine,
    Config,
};

/// Application state
pub struct TokenSyncApp {
    config: Config,
    engine: Arc<SyncEngine>,
    state: AppState,
}

impl TokenSyncApp {
    pub async fn new(config_path: &str) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;
        init_logging(&config.logging);

        info!("Starting token sync service...");
        info!("Configuration loaded from {}", config_path);

        // Stores must be reachable before anything is served
        let records = Arc::new(
            SqliteRecordStore::open(&config.record_store.path).context("failed to open record store")?,
        );

        let index = Arc::new(ElasticIndex::new(&config.index_store)?);
        index.ping().await.context("index store unreachable")?;
        index.ensure_index().await.context("failed to bootstrap index")?;

        let feed = Arc::new(CoinGeckoClient::new(&config.feed)?);

        let engine = Arc::new(SyncEngine::new(
            feed,
            records.clone(),
            index.clone(),
            config.sync.clone(),
        ));

        let state = AppState::new(records, index, Arc::clone(&engine));

        Ok(TokenSyncApp {
            config,
            engine,
            state,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = Arc::clone(&self.engine).spawn(shutdown_rx);

        let app = create_router(self.state);
        let listener = TcpListener::bind(&self.config.server.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.server.bind_addr))?;

        info!("🚀 Listening on {}", self.config.server.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Starting shutdown sequence...");
        // Worker may already be gone; a closed channel also stops it
        let _ = shutdown_tx.send(());
        if let Err(e) = worker.await {
            error!("❌ Sync worker panicked: {}", e);
        }

        info!("Shutdown sequence completed");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received - initiating graceful shutdown"),
        _ = terminate => info!("SIGTERM received - initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let app = TokenSyncApp::new(&config_path).await?;

    app.run().await?;

    Ok(())
}
