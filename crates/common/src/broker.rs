use async_trait::async_trait;

use crate::{BrokerPosition, CloseBar, FutureQuote, OptionQuote, Result};

/// Abstraction over the broker / pricing-source connection.
///
/// `BrokerClient` in `crates/feed` implements this against the REST API.
/// Route handlers and the P&L tracker hold a `dyn BrokerApi` so tests can
/// substitute a canned source.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// List known option expiration codes (`YYYYMMDD`) for an underlying.
    async fn expirations(&self, symbol: &str) -> Result<Vec<String>>;

    /// Fetch the option chain for one (underlying, expiration).
    async fn option_chain(&self, symbol: &str, expiration: &str) -> Result<Vec<OptionQuote>>;

    /// Fetch future quotes for an underlying, one per expiration.
    async fn future_quotes(&self, symbol: &str) -> Result<Vec<FutureQuote>>;

    /// Query currently open positions from the broker.
    async fn open_positions(&self) -> Result<Vec<BrokerPosition>>;

    /// Fetch up to `limit` most recent daily closes for an underlying.
    async fn daily_closes(&self, symbol: &str, limit: u32) -> Result<Vec<CloseBar>>;
}
