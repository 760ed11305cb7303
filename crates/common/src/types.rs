use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One option quote cell of the price grid, keyed by (expiration, strike).
/// Produced by the pricing source; the spread engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Expiration encoded as an 8-digit `YYYYMMDD` string.
    pub expiration: String,
    pub strike: f64,
    pub bid: f64,
    pub ask: f64,
    pub mid_price: f64,
    pub last_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeks: Option<Greeks>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

/// Underlying future quote. Exactly one per expiration; its mid price anchors
/// the sell leg near the money.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FutureQuote {
    pub expiration: String,
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub mid_price: f64,
    pub last_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Option price grid: expiration code -> quotes for that expiration.
/// A `BTreeMap` keeps expiration iteration order deterministic, which the
/// engine relies on for stable ranking of equal scores.
pub type PriceGrid = BTreeMap<String, Vec<OptionQuote>>;

/// Future mid prices keyed by expiration code.
pub type FutureBoard = BTreeMap<String, FutureQuote>;

/// Per-candidate metrics, computed once and immutable thereafter.
///
/// `profit_loss_ratio` and `capital_efficiency` are the same formula kept as
/// two named fields for output-shape compatibility with existing consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadMetrics {
    pub max_profit: f64,
    pub max_loss: f64,
    pub profit_loss_ratio: f64,
    pub break_even_point: f64,
    pub win_rate: f64,
    pub capital_efficiency: f64,
    pub quarterly_return: f64,
    pub annualized_return: f64,
    pub time_adjusted_score: f64,
    pub optimal_timing_bonus: f64,
}

/// A scored sell/buy strike pair produced by the spread engine.
/// Ephemeral: built fresh on every engine invocation, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadCandidate {
    /// Deterministic id: `{expiration}-{sell_strike}-{buy_strike}`.
    pub id: String,
    pub expiration: String,
    pub days_to_expiration: i64,
    pub sell_strike: f64,
    pub buy_strike: f64,
    pub sell_price: f64,
    pub buy_price: f64,
    /// `buy_price - sell_price`; always positive for surviving candidates.
    pub net_debit: f64,
    pub future_price: f64,
    /// Contract multiplier applied to all dollar metrics.
    pub quantity: u32,
    pub metrics: SpreadMetrics,
}

/// Direction of a broker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// An open position as reported by the broker, marked to the latest price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub id: String,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub avg_price: f64,
    /// Latest mark; starts at the broker-reported price, updated on ticks.
    pub mark_price: f64,
    pub unrealized_pnl: f64,
    pub updated_at: DateTime<Utc>,
}

impl BrokerPosition {
    /// Re-mark the position at `price` and recompute unrealized P&L.
    pub fn mark(&mut self, price: f64, at: DateTime<Utc>) {
        self.mark_price = price;
        self.unrealized_pnl = match self.side {
            PositionSide::Long => (price - self.avg_price) * self.quantity,
            PositionSide::Short => (self.avg_price - price) * self.quantity,
        };
        self.updated_at = at;
    }
}

/// One cached daily close row for the history view.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CloseBar {
    pub symbol: String,
    /// Trading day as `YYYY-MM-DD`.
    pub trade_date: String,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Live price tick for an underlying symbol from the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickEvent {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Pushed to dashboard WebSocket clients whenever positions re-mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub positions: Vec<BrokerPosition>,
    pub total_unrealized_pnl: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionUpdate {
    pub fn snapshot(positions: Vec<BrokerPosition>, at: DateTime<Utc>) -> Self {
        let total_unrealized_pnl = positions.iter().map(|p| p.unrealized_pnl).sum();
        Self {
            positions,
            total_unrealized_pnl,
            timestamp: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_position_gains_when_price_rises() {
        let mut pos = BrokerPosition {
            id: "p1".into(),
            symbol: "CL".into(),
            side: PositionSide::Long,
            quantity: 2.0,
            avg_price: 70.0,
            mark_price: 70.0,
            unrealized_pnl: 0.0,
            updated_at: Utc::now(),
        };
        pos.mark(72.5, Utc::now());
        assert!((pos.unrealized_pnl - 5.0).abs() < 1e-9);
    }

    #[test]
    fn short_position_gains_when_price_falls() {
        let mut pos = BrokerPosition {
            id: "p2".into(),
            symbol: "CL".into(),
            side: PositionSide::Short,
            quantity: 3.0,
            avg_price: 70.0,
            mark_price: 70.0,
            unrealized_pnl: 0.0,
            updated_at: Utc::now(),
        };
        pos.mark(68.0, Utc::now());
        assert!((pos.unrealized_pnl - 6.0).abs() < 1e-9);
    }

    #[test]
    fn position_update_sums_unrealized_pnl() {
        let now = Utc::now();
        let mut a = BrokerPosition {
            id: "a".into(),
            symbol: "CL".into(),
            side: PositionSide::Long,
            quantity: 1.0,
            avg_price: 10.0,
            mark_price: 10.0,
            unrealized_pnl: 0.0,
            updated_at: now,
        };
        let mut b = a.clone();
        b.id = "b".into();
        b.side = PositionSide::Short;
        a.mark(12.0, now);
        b.mark(12.0, now);
        let update = PositionUpdate::snapshot(vec![a, b], now);
        assert!((update.total_unrealized_pnl - 0.0).abs() < 1e-9);
    }
}
