//! Indicator engine: pulls market data and turns it into scores
//!
//! The engine never fails a report because of the market-data provider. A
//! failed fetch becomes a missing value (`None` or a zero-sample bucket) that
//! the formatter marks visibly.

use super::flow::{momentum_ratio, order_flow_ratio, volume_weighted_flow};
use super::strength::{StrengthScores, strength_scores};
use crate::config::PulseConfig;
use crate::error::Result;
use crate::market::{Interval, MarketSnapshotSource, Symbol, TickerSnapshot};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// IO score of one interval; `None` when the candle fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalScore {
    pub interval: Interval,
    pub score: Option<f64>,
}

/// MTS ratio plus the IO scores it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumSignal {
    pub ratio: f64,
    pub short: IntervalScore,
    pub long: IntervalScore,
    /// Last traded price, if the price fetch succeeded
    pub price: Option<f64>,
}

impl MomentumSignal {
    pub fn is_degraded(&self) -> bool {
        self.short.score.is_none() || self.long.score.is_none()
    }
}

/// NPR score of one interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetFlow {
    pub interval: Interval,
    pub score: f64,
    /// Symbols that contributed to the weighted mean
    pub contributors: usize,
}

/// Computes AP, IO, MTS and NPR from a market-data source
#[derive(Clone)]
pub struct IndicatorEngine {
    source: Arc<dyn MarketSnapshotSource>,
    config: Arc<PulseConfig>,
}

impl IndicatorEngine {
    pub fn new(source: Arc<dyn MarketSnapshotSource>, config: Arc<PulseConfig>) -> Self {
        Self { source, config }
    }

    /// Normalize user input into a pair using the configured settlement currency
    pub fn symbol(&self, raw: &str) -> Result<Symbol> {
        Symbol::pair(raw, &self.config.settlement_currency)
    }

    /// AP strength triple; all buckets are missing if the snapshot fetch fails
    pub async fn strength(&self) -> StrengthScores {
        match self.source.fetch_full_market_snapshot().await {
            Ok(snapshot) => {
                debug!(pairs = snapshot.len(), "Fetched full market snapshot");
                strength_scores(
                    &snapshot,
                    &self.config.thresholds,
                    &self.config.settlement_currency,
                )
            }
            Err(e) => {
                warn!(error = %e, "Market snapshot unavailable, AP degraded");
                StrengthScores::unavailable()
            }
        }
    }

    /// IO score of one symbol and interval
    pub async fn order_flow(&self, symbol: &Symbol, interval: Interval) -> Option<f64> {
        match self
            .source
            .fetch_candles(symbol, interval, self.config.candle_limit)
            .await
        {
            Ok(set) => Some(order_flow_ratio(&set.candles)),
            Err(e) => {
                warn!(symbol = %symbol, interval = %interval, error = %e, "Candle fetch failed");
                None
            }
        }
    }

    /// IO scores of one symbol for several intervals, fetched concurrently
    pub async fn order_flows(&self, symbol: &Symbol, intervals: &[Interval]) -> Vec<IntervalScore> {
        let scores = join_all(
            intervals
                .iter()
                .map(|&interval| self.order_flow(symbol, interval)),
        )
        .await;

        intervals
            .iter()
            .zip(scores)
            .map(|(&interval, score)| IntervalScore { interval, score })
            .collect()
    }

    /// MTS ratio of the configured short and long intervals.
    ///
    /// A side whose fetch failed counts as 0 and the signal is flagged degraded.
    pub async fn momentum(&self, symbol: &Symbol) -> MomentumSignal {
        let (short, long, price) = futures::join!(
            self.order_flow(symbol, self.config.mts_short),
            self.order_flow(symbol, self.config.mts_long),
            self.source.fetch_symbol_price(symbol),
        );
        let price = price
            .inspect_err(|e| warn!(symbol = %symbol, error = %e, "Price fetch failed"))
            .ok();

        MomentumSignal {
            ratio: momentum_ratio(short.unwrap_or(0.0), long.unwrap_or(0.0)),
            short: IntervalScore {
                interval: self.config.mts_short,
                score: short,
            },
            long: IntervalScore {
                interval: self.config.mts_long,
                score: long,
            },
            price,
        }
    }

    /// NPR: volume-weighted IO of a basket, one value per interval.
    ///
    /// Symbols whose 24h or candle fetch fails drop out of that interval's
    /// weighted mean; if every symbol fails the score is 0.
    pub async fn net_flow(&self, symbols: &[Symbol], intervals: &[Interval]) -> Vec<NetFlow> {
        let volumes: Vec<(Symbol, f64)> = join_all(symbols.iter().map(|s| self.ticker(s)))
            .await
            .into_iter()
            .zip(symbols)
            .filter_map(|(ticker, symbol)| match ticker {
                Ok(t) => Some((symbol.clone(), t.quote_volume)),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "24h fetch failed, excluded from NPR");
                    None
                }
            })
            .collect();

        let mut flows = Vec::with_capacity(intervals.len());
        for &interval in intervals {
            let ios = join_all(
                volumes
                    .iter()
                    .map(|(symbol, _)| self.order_flow(symbol, interval)),
            )
            .await;

            let samples: Vec<(f64, f64)> = ios
                .into_iter()
                .zip(&volumes)
                .filter_map(|(io, (_, volume))| io.map(|io| (io, *volume)))
                .collect();

            flows.push(NetFlow {
                interval,
                score: volume_weighted_flow(&samples),
                contributors: samples.len(),
            });
        }
        flows
    }

    /// 24h statistics of one pair
    pub async fn ticker(&self, symbol: &Symbol) -> Result<TickerSnapshot> {
        self.source.fetch_symbol_24h(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PulseError;
    use crate::market::{Candle, CandleSet, MockMarketSnapshotSource};
    use chrono::Utc;

    fn candles(symbol: &Symbol, interval: Interval, spec: &[(f64, f64, f64)]) -> CandleSet {
        let candles = spec
            .iter()
            .map(|&(open, close, volume)| Candle {
                open_time: Utc::now(),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
            })
            .collect();
        CandleSet::new(symbol.clone(), interval, candles)
    }

    fn ticker(symbol: &Symbol, volume: f64) -> TickerSnapshot {
        TickerSnapshot {
            symbol: symbol.clone(),
            last_price: 100.0,
            price_change_percent: 1.0,
            high_price: 110.0,
            low_price: 90.0,
            quote_volume: volume,
        }
    }

    fn engine(mock: MockMarketSnapshotSource) -> IndicatorEngine {
        IndicatorEngine::new(Arc::new(mock), Arc::new(PulseConfig::default()))
    }

    #[tokio::test]
    async fn test_strength_degrades_on_fetch_failure() {
        let mut mock = MockMarketSnapshotSource::new();
        mock.expect_fetch_full_market_snapshot()
            .returning(|| Err(PulseError::Upstream("timeout".into())));

        let scores = engine(mock).strength().await;
        assert_eq!(scores, StrengthScores::unavailable());
        assert_eq!(scores.btc.score, 0.0);
    }

    #[tokio::test]
    async fn test_order_flow_empty_candles_is_zero() {
        let mut mock = MockMarketSnapshotSource::new();
        mock.expect_fetch_candles()
            .returning(|symbol, interval, _| Ok(candles(symbol, interval, &[])));

        let engine = engine(mock);
        let symbol = engine.symbol("btc").unwrap();
        assert_eq!(engine.order_flow(&symbol, Interval::OneHour).await, Some(0.0));
    }

    #[tokio::test]
    async fn test_momentum_uses_configured_intervals() {
        let mut mock = MockMarketSnapshotSource::new();
        mock.expect_fetch_candles().returning(|symbol, interval, _| {
            let spec: &[(f64, f64, f64)] = match interval {
                Interval::FifteenMinutes => &[(1.0, 2.0, 60.0), (2.0, 1.0, 40.0)],
                Interval::FourHours => &[(1.0, 2.0, 40.0), (2.0, 1.0, 60.0)],
                _ => &[],
            };
            Ok(candles(symbol, interval, spec))
        });
        mock.expect_fetch_symbol_price()
            .times(1)
            .returning(|_| Ok(2500.0));

        let engine = engine(mock);
        let symbol = engine.symbol("eth").unwrap();
        let signal = engine.momentum(&symbol).await;

        assert_eq!(signal.price, Some(2500.0));
        assert_eq!(signal.short.score, Some(60.0));
        assert_eq!(signal.long.score, Some(40.0));
        assert_eq!(signal.ratio, 1.5);
        assert!(!signal.is_degraded());
    }

    #[tokio::test]
    async fn test_momentum_with_failed_side() {
        let mut mock = MockMarketSnapshotSource::new();
        mock.expect_fetch_candles()
            .returning(|_, _, _| Err(PulseError::Upstream("down".into())));
        mock.expect_fetch_symbol_price()
            .returning(|_| Err(PulseError::Upstream("down".into())));

        let engine = engine(mock);
        let symbol = engine.symbol("eth").unwrap();
        let signal = engine.momentum(&symbol).await;

        assert_eq!(signal.price, None);
        assert_eq!(signal.ratio, 1.0);
        assert!(signal.is_degraded());
    }

    #[tokio::test]
    async fn test_net_flow_weights_by_volume_and_skips_failures() {
        let mut mock = MockMarketSnapshotSource::new();
        mock.expect_fetch_symbol_24h().returning(|symbol| match symbol.as_str() {
            "BTCUSDT" => Ok(ticker(symbol, 3.0)),
            "ETHUSDT" => Ok(ticker(symbol, 1.0)),
            _ => Err(PulseError::Upstream("unknown".into())),
        });
        mock.expect_fetch_candles().returning(|symbol, interval, _| {
            let spec: &[(f64, f64, f64)] = match symbol.as_str() {
                "BTCUSDT" => &[(1.0, 2.0, 80.0), (2.0, 1.0, 20.0)],
                _ => &[(1.0, 2.0, 40.0), (2.0, 1.0, 60.0)],
            };
            Ok(candles(symbol, interval, spec))
        });

        let engine = engine(mock);
        let symbols = vec![
            engine.symbol("btc").unwrap(),
            engine.symbol("eth").unwrap(),
            engine.symbol("nope").unwrap(),
        ];
        let flows = engine
            .net_flow(&symbols, &[Interval::FifteenMinutes, Interval::OneHour])
            .await;

        assert_eq!(flows.len(), 2);
        for flow in flows {
            assert_eq!(flow.score, 70.0);
            assert_eq!(flow.contributors, 2);
        }
    }

    #[tokio::test]
    async fn test_net_flow_all_failures_is_zero() {
        let mut mock = MockMarketSnapshotSource::new();
        mock.expect_fetch_symbol_24h()
            .returning(|_| Err(PulseError::Upstream("down".into())));
        mock.expect_fetch_candles().never();

        let engine = engine(mock);
        let symbols = vec![engine.symbol("btc").unwrap(), engine.symbol("eth").unwrap()];
        let flows = engine
            .net_flow(&symbols, &[Interval::FifteenMinutes, Interval::OneHour, Interval::FourHours])
            .await;

        assert_eq!(flows.len(), 3);
        assert!(flows.iter().all(|f| f.score == 0.0 && f.contributors == 0));
    }

    #[tokio::test]
    async fn test_order_flows_keeps_interval_order() {
        let mut mock = MockMarketSnapshotSource::new();
        mock.expect_fetch_candles().returning(|symbol, interval, _| {
            if interval == Interval::OneHour {
                Err(PulseError::Upstream("timeout".into()))
            } else {
                Ok(candles(symbol, interval, &[(1.0, 2.0, 1.0)]))
            }
        });

        let engine = engine(mock);
        let symbol = engine.symbol("sol").unwrap();
        let intervals = [Interval::FifteenMinutes, Interval::OneHour, Interval::FourHours];
        let scores = engine.order_flows(&symbol, &intervals).await;

        assert_eq!(
            scores,
            vec![
                IntervalScore { interval: Interval::FifteenMinutes, score: Some(100.0) },
                IntervalScore { interval: Interval::OneHour, score: None },
                IntervalScore { interval: Interval::FourHours, score: Some(100.0) },
            ]
        );
    }
}
