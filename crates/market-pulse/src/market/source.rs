//! Boundary to the market-data provider
//!
//! The indicator engine only ever talks to this trait. Every call is a single
//! best-effort fetch: it either returns within the provider's request deadline
//! or fails with [`PulseError::Upstream`](crate::error::PulseError).

use super::{CandleSet, Interval, Symbol, TickerSnapshot};
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSnapshotSource: Send + Sync {
    /// 24h statistics for every tradable pair
    async fn fetch_full_market_snapshot(&self) -> Result<Vec<TickerSnapshot>>;

    /// Latest traded price of one pair
    async fn fetch_symbol_price(&self, symbol: &Symbol) -> Result<f64>;

    /// Most recent `limit` candles of one pair
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSet>;

    /// 24h statistics for one pair
    async fn fetch_symbol_24h(&self, symbol: &Symbol) -> Result<TickerSnapshot>;
}
