use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, PositionUpdate, TickEvent, WatchlistConfig};
use feed::{BrokerClient, HistoryImporter, PnlTracker, QuoteStream};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!("SpreadScout starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Database ready");

    // ── Watchlist ─────────────────────────────────────────────────────────────
    let watchlist = WatchlistConfig::load(&cfg.watchlist_path);
    let symbols = watchlist.symbol_names();
    info!(?symbols, "Watchlist loaded");

    // ── Broker client ─────────────────────────────────────────────────────────
    let broker: Arc<dyn common::BrokerApi> = Arc::new(BrokerClient::new(
        &cfg.broker_api_key,
        &cfg.broker_secret,
        &cfg.broker_base_url,
    ));

    // ── Shared state & channels ───────────────────────────────────────────────
    let positions: Arc<RwLock<Vec<common::BrokerPosition>>> = Arc::new(RwLock::new(Vec::new()));
    let (tick_tx, _) = broadcast::channel::<TickEvent>(1024);
    let (update_tx, _) = broadcast::channel::<PositionUpdate>(256);

    // ── Tick streams (one per watched symbol) ─────────────────────────────────
    for symbol in &symbols {
        let stream = QuoteStream::new(
            symbol.clone(),
            cfg.broker_stream_url.clone(),
            tick_tx.clone(),
        );
        tokio::spawn(stream.run());
    }

    // ── P&L tracker ───────────────────────────────────────────────────────────
    let tracker = PnlTracker::new(
        broker.clone(),
        tick_tx.subscribe(),
        update_tx.clone(),
        positions.clone(),
        db.clone(),
        Duration::from_secs(cfg.position_refresh_secs),
    );
    tokio::spawn(tracker.run());

    // ── Close-price history importer ──────────────────────────────────────────
    let importer = HistoryImporter::new(
        broker.clone(),
        db.clone(),
        symbols.clone(),
        Duration::from_secs(cfg.history_refresh_secs),
    );
    tokio::spawn(importer.run());

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        db: db.clone(),
        broker,
        positions,
        update_tx,
        dashboard_token: cfg.dashboard_token.clone(),
    };
    tokio::spawn(api::serve(api_state, cfg.dashboard_port));

    // Keep main alive
    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received. Exiting.");
}
