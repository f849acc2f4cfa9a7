//! AP (market strength) scoring
//!
//! The full market is split into three overlapping buckets by quote asset and
//! quote volume. Each bucket's mean 24h change is mapped onto 0..=100 with
//! `(mean + 10) * 5`, so a flat market sits at 50 and moves beyond ±10% saturate.

use crate::config::StrengthThresholds;
use crate::market::TickerSnapshot;
use serde::{Deserialize, Serialize};

/// Score of one bucket together with how many pairs fed it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketScore {
    pub score: f64,
    pub samples: usize,
}

impl BucketScore {
    /// Placeholder for a bucket with no data
    pub fn missing() -> Self {
        Self {
            score: 0.0,
            samples: 0,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.samples == 0
    }

    fn from_changes(changes: &[f64]) -> Self {
        if changes.is_empty() {
            return Self::missing();
        }
        let mean = changes.iter().sum::<f64>() / changes.len() as f64;
        Self {
            score: normalize_strength(mean),
            samples: changes.len(),
        }
    }
}

/// The AP triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthScores {
    /// Pairs quoted in BTC
    pub btc: BucketScore,
    /// Pairs quoted in the settlement currency
    pub usdt: BucketScore,
    /// High-volume pairs of any quote
    pub long_term: BucketScore,
}

impl StrengthScores {
    /// All buckets missing, used when the snapshot fetch fails
    pub fn unavailable() -> Self {
        Self {
            btc: BucketScore::missing(),
            usdt: BucketScore::missing(),
            long_term: BucketScore::missing(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.btc.is_missing() || self.usdt.is_missing() || self.long_term.is_missing()
    }
}

/// Map a mean percent change onto `[0, 100]`
pub fn normalize_strength(mean_change: f64) -> f64 {
    if mean_change.is_nan() {
        return 0.0;
    }
    ((mean_change + 10.0) * 5.0).clamp(0.0, 100.0)
}

/// Bucket a full-market snapshot and score each bucket
pub fn strength_scores(
    snapshot: &[TickerSnapshot],
    thresholds: &StrengthThresholds,
    settlement: &str,
) -> StrengthScores {
    let mut btc = Vec::new();
    let mut usdt = Vec::new();
    let mut long_term = Vec::new();

    for ticker in snapshot {
        let change = ticker.price_change_percent;
        if !change.is_finite() {
            continue;
        }
        let volume = ticker.quote_volume;

        if ticker.symbol.is_quoted_in("BTC") && volume > thresholds.btc_min_volume {
            btc.push(change);
        }
        if ticker.symbol.is_quoted_in(settlement) && volume > thresholds.settlement_min_volume {
            usdt.push(change);
        }
        if volume > thresholds.long_term_min_volume {
            long_term.push(change);
        }
    }

    StrengthScores {
        btc: BucketScore::from_changes(&btc),
        usdt: BucketScore::from_changes(&usdt),
        long_term: BucketScore::from_changes(&long_term),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Symbol;

    fn ticker(symbol: &str, change: f64, volume: f64) -> TickerSnapshot {
        TickerSnapshot {
            symbol: Symbol::from_exchange(symbol),
            last_price: 1.0,
            price_change_percent: change,
            high_price: 1.0,
            low_price: 1.0,
            quote_volume: volume,
        }
    }

    #[test]
    fn test_normalize_centers_flat_market() {
        assert_eq!(normalize_strength(0.0), 50.0);
        assert_eq!(normalize_strength(4.0), 70.0);
        assert_eq!(normalize_strength(-6.0), 20.0);
    }

    #[test]
    fn test_normalize_is_bounded() {
        let means = [
            -1e12,
            -10.5,
            -10.0,
            10.0,
            10.01,
            1e12,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
        ];
        for mean in means {
            let score = normalize_strength(mean);
            assert!((0.0..=100.0).contains(&score), "{mean} -> {score}");
        }
    }

    #[test]
    fn test_buckets() {
        let snapshot = vec![
            ticker("ETHBTC", 2.0, 50.0),           // btc
            ticker("LTCBTC", 4.0, 5.0),            // below btc threshold
            ticker("BTCUSDT", 1.0, 9_000_000.0),   // usdt + long
            ticker("SOLUSDT", -3.0, 2_000_000.0),  // usdt
            ticker("DOGEUSDT", 9.0, 100.0),        // too small
            ticker("ETHFDUSD", 6.0, 6_000_000.0),  // long only
        ];

        let scores = strength_scores(&snapshot, &StrengthThresholds::default(), "USDT");

        assert_eq!(scores.btc.samples, 1);
        assert_eq!(scores.btc.score, 60.0);
        assert_eq!(scores.usdt.samples, 2);
        assert_eq!(scores.usdt.score, 45.0);
        assert_eq!(scores.long_term.samples, 2);
        assert_eq!(scores.long_term.score, 67.5);
        assert!(!scores.is_degraded());
    }

    #[test]
    fn test_empty_bucket_scores_zero() {
        let snapshot = vec![ticker("BTCUSDT", 1.0, 2_000_000.0)];
        let scores = strength_scores(&snapshot, &StrengthThresholds::default(), "USDT");

        assert!(scores.btc.is_missing());
        assert_eq!(scores.btc.score, 0.0);
        assert!(scores.long_term.is_missing());
        assert!(scores.is_degraded());
    }

    #[test]
    fn test_non_finite_changes_are_ignored() {
        let snapshot = vec![
            ticker("BTCUSDT", f64::NAN, 9_000_000.0),
            ticker("ETHUSDT", 2.0, 9_000_000.0),
        ];
        let scores = strength_scores(&snapshot, &StrengthThresholds::default(), "USDT");
        assert_eq!(scores.usdt.samples, 1);
        assert_eq!(scores.usdt.score, 60.0);
    }
}
