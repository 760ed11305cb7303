use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{error, info};

use common::{BrokerApi, CloseBar};

/// Default number of daily bars pulled per symbol on each refresh.
const HISTORY_FETCH_LIMIT: u32 = 250;

/// Keeps the local close-price cache warm for the dashboard history view.
///
/// Fetches daily closes for every watched symbol on a fixed interval and
/// upserts them into the `close_prices` table. A failed symbol is logged and
/// skipped; the importer never stops.
pub struct HistoryImporter {
    broker: Arc<dyn BrokerApi>,
    db: SqlitePool,
    symbols: Vec<String>,
    refresh_interval: Duration,
}

impl HistoryImporter {
    pub fn new(
        broker: Arc<dyn BrokerApi>,
        db: SqlitePool,
        symbols: Vec<String>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            broker,
            db,
            symbols,
            refresh_interval,
        }
    }

    /// Run the import loop. Call from `tokio::spawn`.
    pub async fn run(self) {
        info!(symbols = ?self.symbols, "HistoryImporter running");
        let mut interval = tokio::time::interval(self.refresh_interval);

        loop {
            interval.tick().await;
            for symbol in &self.symbols {
                match self.broker.daily_closes(symbol, HISTORY_FETCH_LIMIT).await {
                    Ok(bars) => {
                        let count = bars.len();
                        if let Err(e) = self.upsert_bars(&bars).await {
                            error!(%symbol, error = %e, "Failed to cache close prices");
                        } else {
                            info!(%symbol, bars = count, "Close-price cache refreshed");
                        }
                    }
                    Err(e) => {
                        error!(%symbol, error = %e, "Failed to fetch daily closes");
                    }
                }
            }
        }
    }

    async fn upsert_bars(&self, bars: &[CloseBar]) -> Result<(), sqlx::Error> {
        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO close_prices (symbol, trade_date, close, volume)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(symbol, trade_date) DO UPDATE SET
                    close = excluded.close,
                    volume = excluded.volume
                "#,
            )
            .bind(&bar.symbol)
            .bind(&bar.trade_date)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&self.db)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> SqlitePool {
        let db = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE close_prices (
                symbol TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                close REAL NOT NULL,
                volume REAL,
                PRIMARY KEY (symbol, trade_date)
            )
            "#,
        )
        .execute(&db)
        .await
        .unwrap();
        db
    }

    fn bar(symbol: &str, date: &str, close: f64) -> CloseBar {
        CloseBar {
            symbol: symbol.to_string(),
            trade_date: date.to_string(),
            close,
            volume: Some(1000.0),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_rows() {
        let db = test_db().await;
        let importer = HistoryImporter::new(
            Arc::new(NoopBroker),
            db.clone(),
            vec!["CL".into()],
            Duration::from_secs(3600),
        );

        importer
            .upsert_bars(&[bar("CL", "2025-01-02", 70.0)])
            .await
            .unwrap();
        importer
            .upsert_bars(&[bar("CL", "2025-01-02", 71.5), bar("CL", "2025-01-03", 72.0)])
            .await
            .unwrap();

        let rows: Vec<common::CloseBar> =
            sqlx::query_as("SELECT symbol, trade_date, close, volume FROM close_prices ORDER BY trade_date")
                .fetch_all(&db)
                .await
                .unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].close - 71.5).abs() < 1e-9);
    }

    struct NoopBroker;

    #[async_trait::async_trait]
    impl BrokerApi for NoopBroker {
        async fn expirations(&self, _: &str) -> common::Result<Vec<String>> {
            Ok(vec![])
        }
        async fn option_chain(
            &self,
            _: &str,
            _: &str,
        ) -> common::Result<Vec<common::OptionQuote>> {
            Ok(vec![])
        }
        async fn future_quotes(&self, _: &str) -> common::Result<Vec<common::FutureQuote>> {
            Ok(vec![])
        }
        async fn open_positions(&self) -> common::Result<Vec<common::BrokerPosition>> {
            Ok(vec![])
        }
        async fn daily_closes(&self, _: &str, _: u32) -> common::Result<Vec<CloseBar>> {
            Ok(vec![])
        }
    }
}
