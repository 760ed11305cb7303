use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{Result, TickEvent};

/// Underlying price tick WebSocket stream for a single symbol.
///
/// Connects to the broker's trade stream, parses events into `TickEvent`,
/// and publishes them on a broadcast channel. Reconnects automatically with
/// exponential backoff.
pub struct QuoteStream {
    symbol: String,
    stream_url: String,
    tick_tx: broadcast::Sender<TickEvent>,
}

impl QuoteStream {
    pub fn new(
        symbol: impl Into<String>,
        stream_url: impl Into<String>,
        tick_tx: broadcast::Sender<TickEvent>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            stream_url: stream_url.into(),
            tick_tx,
        }
    }

    /// Run the stream loop forever, reconnecting on failure.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(symbol = %self.symbol, "Connecting to broker tick stream");
            match self.connect_once().await {
                Ok(()) => {
                    info!(symbol = %self.symbol, "Tick stream closed cleanly");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(symbol = %self.symbol, error = %e, backoff = ?backoff, "Tick stream error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let url_str = format!(
            "{}/ws/{}@trade",
            self.stream_url,
            self.symbol.to_lowercase()
        );
        // Validate before dialing; connect_async takes the raw string.
        Url::parse(&url_str).map_err(|e| common::Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url_str.as_str())
            .await
            .map_err(|e| common::Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| common::Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_tick_event(&self.symbol, &text) {
                    Ok(Some(event)) => {
                        // Ignore send errors (no active receivers)
                        let _ = self.tick_tx.send(event);
                    }
                    Ok(None) => {} // non-trade message, skip
                    Err(e) => {
                        warn!(error = %e, "Failed to parse tick event");
                    }
                }
            }
        }

        Ok(())
    }
}

// ─── Trade event JSON parsing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct TradeData {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time_ms: i64,
}

fn parse_tick_event(symbol: &str, text: &str) -> Result<Option<TickEvent>> {
    // Trade messages carry an "e" field set to "trade"
    let wrapper: serde_json::Value = serde_json::from_str(text)?;
    if wrapper.get("e").and_then(|v| v.as_str()) != Some("trade") {
        return Ok(None);
    }

    let data: TradeData = serde_json::from_value(wrapper)?;
    let price = data
        .price
        .parse::<f64>()
        .map_err(|e| common::Error::WebSocket(format!("bad trade price: {e}")))?;
    let timestamp = Utc
        .timestamp_millis_opt(data.trade_time_ms)
        .single()
        .unwrap_or_else(Utc::now);

    Ok(Some(TickEvent {
        symbol: symbol.to_string(),
        price,
        timestamp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_message_parses_into_tick() {
        let text = r#"{"e":"trade","p":"71.42","T":1735828800000}"#;
        let event = parse_tick_event("CL", text).unwrap().unwrap();
        assert_eq!(event.symbol, "CL");
        assert!((event.price - 71.42).abs() < 1e-9);
    }

    #[test]
    fn non_trade_message_is_skipped() {
        let text = r#"{"e":"heartbeat"}"#;
        assert!(parse_tick_event("CL", text).unwrap().is_none());
    }

    #[test]
    fn bad_price_is_an_error() {
        let text = r#"{"e":"trade","p":"oops","T":1735828800000}"#;
        assert!(parse_tick_event("CL", text).is_err());
    }
}
