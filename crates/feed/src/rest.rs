use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use common::{
    BrokerApi, BrokerPosition, CloseBar, Error, FutureQuote, Greeks, OptionQuote, PositionSide,
    Result,
};

/// REST API client for the broker / pricing source.
///
/// Market-data endpoints are public; account endpoints are signed with
/// HMAC-SHA256 over the query string.
pub struct BrokerClient {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
}

impl BrokerClient {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: base_url.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
    }

    fn sign(&self, query: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn get(&self, path: &str, params: &str) -> Result<String> {
        let url = if params.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{params}", self.base_url)
        };

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Broker(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let ts = Self::timestamp_ms();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query);
        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Broker(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl BrokerApi for BrokerClient {
    async fn expirations(&self, symbol: &str) -> Result<Vec<String>> {
        let body = self
            .get("/v1/options/expirations", &format!("symbol={symbol}"))
            .await?;
        let resp: ExpirationsResponse =
            serde_json::from_str(&body).map_err(|e| Error::Broker(e.to_string()))?;
        Ok(resp.expirations)
    }

    async fn option_chain(&self, symbol: &str, expiration: &str) -> Result<Vec<OptionQuote>> {
        debug!(%symbol, %expiration, "Fetching option chain");
        let body = self
            .get(
                "/v1/options/chain",
                &format!("symbol={symbol}&expiration={expiration}"),
            )
            .await?;
        let resp: ChainResponse =
            serde_json::from_str(&body).map_err(|e| Error::Broker(e.to_string()))?;

        Ok(resp
            .quotes
            .into_iter()
            .map(|q| q.into_quote(expiration))
            .collect())
    }

    async fn future_quotes(&self, symbol: &str) -> Result<Vec<FutureQuote>> {
        let body = self
            .get("/v1/futures/quotes", &format!("symbol={symbol}"))
            .await?;
        let resp: FuturesResponse =
            serde_json::from_str(&body).map_err(|e| Error::Broker(e.to_string()))?;

        Ok(resp
            .quotes
            .into_iter()
            .map(|q| q.into_quote(symbol))
            .collect())
    }

    async fn open_positions(&self) -> Result<Vec<BrokerPosition>> {
        let body = self.signed_get("/v1/account/positions", "").await?;
        let resp: PositionsResponse =
            serde_json::from_str(&body).map_err(|e| Error::Broker(e.to_string()))?;

        let now = Utc::now();
        Ok(resp
            .positions
            .into_iter()
            .map(|p| {
                let quantity = parse_price(&p.quantity);
                let avg_price = parse_price(&p.avg_price);
                let mark_price = parse_price(&p.mark_price);
                let side = if p.side.eq_ignore_ascii_case("short") {
                    PositionSide::Short
                } else {
                    PositionSide::Long
                };
                let mut pos = BrokerPosition {
                    // Some broker accounts omit position ids; synthesize one
                    // so the dashboard can still key rows.
                    id: p.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    symbol: p.symbol,
                    side,
                    quantity,
                    avg_price,
                    mark_price,
                    unrealized_pnl: 0.0,
                    updated_at: now,
                };
                pos.mark(mark_price, now);
                pos
            })
            .collect())
    }

    async fn daily_closes(&self, symbol: &str, limit: u32) -> Result<Vec<CloseBar>> {
        let body = self
            .get(
                "/v1/markets/history",
                &format!("symbol={symbol}&limit={limit}"),
            )
            .await?;
        let resp: HistoryResponse =
            serde_json::from_str(&body).map_err(|e| Error::Broker(e.to_string()))?;

        Ok(resp
            .bars
            .into_iter()
            .map(|b| CloseBar {
                symbol: symbol.to_string(),
                trade_date: b.date,
                close: parse_price(&b.close),
                volume: b.volume.map(|v| parse_price(&v)),
            })
            .collect())
    }
}

/// Broker APIs quote prices as strings; treat unparseable values as 0 so a
/// single bad field can't poison a whole chain fetch.
fn parse_price(raw: &str) -> f64 {
    raw.parse::<f64>().unwrap_or(0.0)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ExpirationsResponse {
    expirations: Vec<String>,
}

#[derive(Deserialize)]
struct ChainResponse {
    quotes: Vec<ChainQuote>,
}

#[derive(Deserialize)]
struct ChainQuote {
    strike: f64,
    bid: String,
    ask: String,
    last: String,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    greeks: Option<GreeksRaw>,
}

#[derive(Deserialize)]
struct GreeksRaw {
    delta: f64,
    gamma: f64,
    theta: f64,
    vega: f64,
}

impl ChainQuote {
    fn into_quote(self, expiration: &str) -> OptionQuote {
        let bid = parse_price(&self.bid);
        let ask = parse_price(&self.ask);
        let last = parse_price(&self.last);
        // Mid from the book when both sides exist, else fall back to last.
        let mid_price = if bid > 0.0 && ask > 0.0 {
            (bid + ask) / 2.0
        } else {
            last
        };
        OptionQuote {
            expiration: expiration.to_string(),
            strike: self.strike,
            bid,
            ask,
            mid_price,
            last_price: last,
            volume: self.volume.map(|v| parse_price(&v)),
            greeks: self.greeks.map(|g| Greeks {
                delta: g.delta,
                gamma: g.gamma,
                theta: g.theta,
                vega: g.vega,
            }),
        }
    }
}

#[derive(Deserialize)]
struct FuturesResponse {
    quotes: Vec<FutureRaw>,
}

#[derive(Deserialize)]
struct FutureRaw {
    expiration: String,
    bid: String,
    ask: String,
    last: String,
    #[serde(default)]
    volume: Option<String>,
}

impl FutureRaw {
    fn into_quote(self, symbol: &str) -> FutureQuote {
        let bid = parse_price(&self.bid);
        let ask = parse_price(&self.ask);
        let last = parse_price(&self.last);
        let mid_price = if bid > 0.0 && ask > 0.0 {
            (bid + ask) / 2.0
        } else {
            last
        };
        FutureQuote {
            expiration: self.expiration,
            symbol: symbol.to_string(),
            bid,
            ask,
            mid_price,
            last_price: last,
            volume: self.volume.map(|v| parse_price(&v)),
        }
    }
}

#[derive(Deserialize)]
struct PositionsResponse {
    positions: Vec<PositionRaw>,
}

#[derive(Deserialize)]
struct PositionRaw {
    #[serde(default)]
    id: Option<String>,
    symbol: String,
    side: String,
    quantity: String,
    avg_price: String,
    mark_price: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
    bars: Vec<BarRaw>,
}

#[derive(Deserialize)]
struct BarRaw {
    date: String,
    close: String,
    #[serde(default)]
    volume: Option<String>,
}
