//! Order-flow arithmetic shared by the IO, MTS and NPR reports

use crate::market::Candle;

/// Share of candle volume that traded in up-closing candles, in percent.
///
/// Returns exactly 0 when there is no volume at all.
pub fn order_flow_ratio(candles: &[Candle]) -> f64 {
    let (buy, sell) = candles
        .iter()
        .filter(|c| c.volume.is_finite() && c.volume > 0.0)
        .fold((0.0, 0.0), |(buy, sell), c| {
            if c.is_bullish() {
                (buy + c.volume, sell)
            } else {
                (buy, sell + c.volume)
            }
        });

    let total = buy + sell;
    if total == 0.0 {
        return 0.0;
    }
    buy / total * 100.0
}

/// `(short + 1) / (long + 1)` rounded to one decimal
pub fn momentum_ratio(short_io: f64, long_io: f64) -> f64 {
    let ratio = (short_io + 1.0) / (long_io + 1.0);
    (ratio * 10.0).round() / 10.0
}

/// Volume-weighted mean of `(io, volume)` samples; 0 without volume
pub fn volume_weighted_flow(samples: &[(f64, f64)]) -> f64 {
    let (weighted, total) = samples
        .iter()
        .filter(|(io, volume)| io.is_finite() && volume.is_finite() && *volume > 0.0)
        .fold((0.0, 0.0), |(weighted, total), (io, volume)| {
            (weighted + io * volume, total + volume)
        });

    if total == 0.0 {
        return 0.0;
    }
    weighted / total
}
