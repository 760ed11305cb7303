use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use common::{BrokerApi, BrokerPosition, PositionUpdate, TickEvent};

/// Tracks live broker positions and streams P&L updates.
///
/// Positions are refreshed from the broker on a fixed interval and re-marked
/// on every price tick in between. Each change is pushed on the update
/// broadcast (consumed by the dashboard WebSocket) and the latest snapshot is
/// persisted for the history views.
pub struct PnlTracker {
    broker: Arc<dyn BrokerApi>,
    tick_rx: broadcast::Receiver<TickEvent>,
    update_tx: broadcast::Sender<PositionUpdate>,
    /// Shared with the API layer for the GET /api/positions snapshot.
    positions: Arc<RwLock<Vec<BrokerPosition>>>,
    db: SqlitePool,
    refresh_interval: Duration,
}

impl PnlTracker {
    pub fn new(
        broker: Arc<dyn BrokerApi>,
        tick_rx: broadcast::Receiver<TickEvent>,
        update_tx: broadcast::Sender<PositionUpdate>,
        positions: Arc<RwLock<Vec<BrokerPosition>>>,
        db: SqlitePool,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            broker,
            tick_rx,
            update_tx,
            positions,
            db,
            refresh_interval,
        }
    }

    /// Run the tracker loop. Processes broker refreshes and price ticks
    /// concurrently via `tokio::select!`. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("PnlTracker running");
        let mut refresh = tokio::time::interval(self.refresh_interval);

        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    self.refresh_positions().await;
                }

                event = self.tick_rx.recv() => {
                    match event {
                        Ok(tick) => self.handle_tick(tick).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(dropped = n, "PnlTracker tick channel lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("Tick broadcast closed — PnlTracker exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Pull the full position list from the broker and replace the snapshot.
    async fn refresh_positions(&self) {
        match self.broker.open_positions().await {
            Ok(fresh) => {
                {
                    let mut positions = self.positions.write().await;
                    *positions = fresh;
                }
                self.broadcast_and_persist().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh positions from broker");
            }
        }
    }

    /// Re-mark any position on the ticked symbol at the new price.
    async fn handle_tick(&self, tick: TickEvent) {
        let mut changed = false;
        {
            let mut positions = self.positions.write().await;
            for pos in positions.iter_mut().filter(|p| p.symbol == tick.symbol) {
                pos.mark(tick.price, tick.timestamp);
                changed = true;
            }
        }
        if changed {
            self.broadcast_and_persist().await;
        }
    }

    async fn broadcast_and_persist(&self) {
        let snapshot = self.positions.read().await.clone();
        let update = PositionUpdate::snapshot(snapshot, Utc::now());

        if let Err(e) = self.persist_snapshot(&update.positions).await {
            error!("Failed to persist position snapshot: {e}");
        }

        // Ignore send errors (no active dashboard clients)
        let _ = self.update_tx.send(update);
    }

    async fn persist_snapshot(&self, positions: &[BrokerPosition]) -> Result<(), sqlx::Error> {
        for pos in positions {
            let side = pos.side.to_string();
            let updated_at = pos.updated_at.to_rfc3339();
            sqlx::query(
                r#"
                INSERT INTO position_snapshots
                    (id, symbol, side, quantity, avg_price, mark_price, unrealized_pnl, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    mark_price = excluded.mark_price,
                    unrealized_pnl = excluded.unrealized_pnl,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&pos.id)
            .bind(&pos.symbol)
            .bind(&side)
            .bind(pos.quantity)
            .bind(pos.avg_price)
            .bind(pos.mark_price)
            .bind(pos.unrealized_pnl)
            .bind(&updated_at)
            .execute(&self.db)
            .await?;
        }
        Ok(())
    }
}
