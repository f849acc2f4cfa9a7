//! Report payloads, their text rendering and delivery

pub mod formatter;
pub mod sink;

pub use formatter::ReportFormatter;
pub use sink::{BufferSink, ReportSink, StdoutSink, TelegramSink};

#[cfg(test)]
pub use sink::MockReportSink;

use crate::history::ApRecord;
use crate::indicators::{IntervalScore, StrengthScores};
use crate::market::{Symbol, TickerSnapshot};
use serde::{Deserialize, Serialize};

/// AP scores plus the record they are compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApReport {
    pub scores: StrengthScores,
    pub previous: Option<ApRecord>,
}

/// IO ratios and 24h statistics of one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoReport {
    pub symbol: Symbol,
    pub scores: Vec<IntervalScore>,
    /// `None` when the 24h fetch failed
    pub ticker: Option<TickerSnapshot>,
}

/// One line of a price report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub symbol: Symbol,
    pub ticker: Option<TickerSnapshot>,
    /// Last price recorded for this symbol in the list's stream
    pub previous_price: Option<f64>,
}

/// Prices of a named list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReport {
    pub list: String,
    pub rows: Vec<PriceRow>,
}
