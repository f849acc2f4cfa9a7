//! Named record streams and their on-disk schema

use std::fmt;

/// One append-only CSV stream in the data directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stream {
    /// AP strength scores
    Ap,
    /// IO flow ratios per symbol
    Io,
    /// Prices of one named symbol list
    Prices(String),
    /// Alarm definitions
    Alarms,
}

impl Stream {
    pub(crate) const PRICES_PREFIX: &'static str = "prices_";
    pub(crate) const EXTENSION: &'static str = ".csv";

    /// File name inside the data directory
    pub fn file_name(&self) -> String {
        match self {
            Self::Ap => "ap_history.csv".to_string(),
            Self::Io => "io_history.csv".to_string(),
            Self::Prices(list) => format!("{}{}{}", Self::PRICES_PREFIX, list, Self::EXTENSION),
            Self::Alarms => "alarms.csv".to_string(),
        }
    }

    /// Header row written when the stream is created
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Self::Ap => &["timestamp", "btc_strength", "usdt_strength", "long_term_strength"],
            Self::Io => &["timestamp", "symbol", "ratios"],
            Self::Prices(_) => &["timestamp", "symbol", "price", "change_percent"],
            Self::Alarms => &["created_at", "fire_spec", "commands", "recurring"],
        }
    }

    /// Recover a price stream from its file name
    pub(crate) fn from_price_file(file_name: &str) -> Option<Self> {
        file_name
            .strip_prefix(Self::PRICES_PREFIX)?
            .strip_suffix(Self::EXTENSION)
            .filter(|list| !list.is_empty())
            .map(|list| Self::Prices(list.to_string()))
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ap => f.write_str("ap"),
            Self::Io => f.write_str("io"),
            Self::Prices(list) => write!(f, "prices:{list}"),
            Self::Alarms => f.write_str("alarms"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_file_round_trip() {
        let stream = Stream::Prices("majors".to_string());
        assert_eq!(stream.file_name(), "prices_majors.csv");
        assert_eq!(Stream::from_price_file("prices_majors.csv"), Some(stream));
        assert_eq!(Stream::from_price_file("prices_.csv"), None);
        assert_eq!(Stream::from_price_file("alarms.csv"), None);
    }
}
