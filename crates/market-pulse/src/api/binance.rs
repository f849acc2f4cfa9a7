//! Binance spot REST client

use crate::error::{PulseError, Result};
use crate::market::{
    Candle, CandleSet, Interval, MarketSnapshotSource, Symbol, TickerSnapshot,
};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Public Binance market-data client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

/// `/api/v3/ticker/24hr` entry; Binance sends numbers as strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    high_price: String,
    low_price: String,
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    price: String,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

fn number(field: &str, raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| PulseError::Upstream(format!("{field} is not a number: {raw:?}")))
}

impl TryFrom<RawTicker> for TickerSnapshot {
    type Error = PulseError;

    fn try_from(raw: RawTicker) -> Result<Self> {
        Ok(Self {
            last_price: number("lastPrice", &raw.last_price)?,
            price_change_percent: number("priceChangePercent", &raw.price_change_percent)?,
            high_price: number("highPrice", &raw.high_price)?,
            low_price: number("lowPrice", &raw.low_price)?,
            quote_volume: number("quoteVolume", &raw.quote_volume)?,
            symbol: Symbol::from_exchange(raw.symbol),
        })
    }
}

/// Decode `/api/v3/klines` rows: `[openTime, open, high, low, close, volume, ...]`
fn parse_klines(rows: &[Vec<serde_json::Value>]) -> Result<Vec<Candle>> {
    rows.iter()
        .map(|row| {
            let text = |idx: usize, field: &str| -> Result<f64> {
                let raw = row
                    .get(idx)
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| PulseError::Upstream(format!("kline missing {field}")))?;
                number(field, raw)
            };

            let open_ms = row
                .first()
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| PulseError::Upstream("kline missing open time".to_string()))?;
            let open_time = DateTime::from_timestamp_millis(open_ms)
                .ok_or_else(|| PulseError::Upstream(format!("bad kline open time {open_ms}")))?;

            Ok(Candle {
                open_time,
                open: text(1, "open")?,
                high: text(2, "high")?,
                low: text(3, "low")?,
                close: text(4, "close")?,
                volume: text(5, "volume")?,
            })
        })
        .collect()
}

impl BinanceClient {
    /// Create a client with a fixed per-request deadline
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, ?query, "Binance request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| PulseError::Upstream(format!("{path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| format!("{} ({})", e.msg, e.code))
                .unwrap_or(body);
            return Err(PulseError::Upstream(format!("{path}: HTTP {status}: {detail}")));
        }

        response
            .json()
            .await
            .map_err(|e| PulseError::Upstream(format!("{path}: invalid body: {e}")))
    }
}

#[async_trait]
impl MarketSnapshotSource for BinanceClient {
    async fn fetch_full_market_snapshot(&self) -> Result<Vec<TickerSnapshot>> {
        let raw: Vec<RawTicker> = self.get_json("/api/v3/ticker/24hr", &[]).await?;
        let total = raw.len();

        // Delisted pairs sometimes carry empty fields; drop them instead of
        // failing the whole snapshot
        let tickers: Vec<TickerSnapshot> = raw
            .into_iter()
            .filter_map(|t| TickerSnapshot::try_from(t).ok())
            .collect();

        debug!(total, parsed = tickers.len(), "Parsed full market snapshot");
        Ok(tickers)
    }

    async fn fetch_symbol_price(&self, symbol: &Symbol) -> Result<f64> {
        let raw: RawPrice = self
            .get_json("/api/v3/ticker/price", &[("symbol", symbol.as_str())])
            .await?;
        number("price", &raw.price)
    }

    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSet> {
        let limit = limit.to_string();
        let rows: Vec<Vec<serde_json::Value>> = self
            .get_json(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.as_str()),
                    ("interval", interval.as_str()),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;

        Ok(CandleSet::new(symbol.clone(), interval, parse_klines(&rows)?))
    }

    async fn fetch_symbol_24h(&self, symbol: &Symbol) -> Result<TickerSnapshot> {
        let raw: RawTicker = self
            .get_json("/api/v3/ticker/24hr", &[("symbol", symbol.as_str())])
            .await?;
        TickerSnapshot::try_from(raw)
    }
}
