//! Market data model and the provider boundary

pub mod interval;
pub mod snapshot;
pub mod source;
pub mod symbol;

pub use interval::Interval;
pub use snapshot::{Candle, CandleSet, TickerSnapshot};
pub use source::MarketSnapshotSource;
pub use symbol::Symbol;

#[cfg(test)]
pub use source::MockMarketSnapshotSource;
