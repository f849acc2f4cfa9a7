//! Typed rows stored in the history streams

use crate::market::Interval;
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// Timestamp format used in every stream
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time truncated to what the files can hold
pub fn now_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Parse a stored timestamp
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
}

/// serde adapter for [`TIMESTAMP_FORMAT`]
pub mod timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("bad timestamp: {raw}")))
    }
}

/// One AP computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApRecord {
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub btc_strength: f64,
    pub usdt_strength: f64,
    pub long_term_strength: f64,
}

/// Flow ratios of one symbol, encoded as `15m=55.2;1h=48`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoRecord {
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub ratios: String,
}

impl IoRecord {
    /// Build a record, leaving out intervals whose fetch failed
    pub fn new(timestamp: NaiveDateTime, symbol: &str, ratios: &[(Interval, Option<f64>)]) -> Self {
        let ratios = ratios
            .iter()
            .filter_map(|(interval, score)| score.map(|s| format!("{interval}={s:.2}")))
            .collect::<Vec<_>>()
            .join(";");
        Self {
            timestamp,
            symbol: symbol.to_string(),
            ratios,
        }
    }
}

/// Price of one symbol at report time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
}

/// Persisted alarm definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
    pub fire_spec: String,
    pub commands: String,
    pub recurring: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_record_ratios() {
        let ts = parse_timestamp("2026-10-16 09:30:00").unwrap();
        let record = IoRecord::new(
            ts,
            "BTCUSDT",
            &[
                (Interval::FifteenMinutes, Some(55.234)),
                (Interval::OneHour, None),
                (Interval::FourHours, Some(40.0)),
            ],
        );
        assert_eq!(record.ratios, "15m=55.23;4h=40.00");
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2026-10-16 09:30:00").is_some());
        assert!(parse_timestamp("16/10/2026").is_none());
    }
}
