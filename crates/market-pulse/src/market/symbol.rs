//! Trading pair symbols

use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An uppercase trading pair such as `BTCUSDT`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize user input into a full trading pair.
    ///
    /// `btc` becomes `BTCUSDT` when `settlement` is `USDT`. Input is kept as a
    /// full pair only when it is written with a separator (`eth/btc`,
    /// `eth-btc`) or already ends with the settlement currency. Any other
    /// input is a base asset, even when it ends like a quote (`WBTC`).
    pub fn pair(raw: &str, settlement: &str) -> Result<Self> {
        let upper = raw.trim().to_uppercase();
        if upper.is_empty() {
            return Err(PulseError::Validation("Empty symbol".to_string()));
        }

        let has_separator = upper.contains('/') || upper.contains('-');
        let compact: String = upper.chars().filter(|c| *c != '/' && *c != '-').collect();

        if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PulseError::Validation(format!("Invalid symbol: {raw}")));
        }

        let is_full_pair =
            has_separator || (compact.len() > settlement.len() && compact.ends_with(settlement));

        if is_full_pair {
            Ok(Self(compact))
        } else {
            Ok(Self(format!("{compact}{settlement}")))
        }
    }

    /// Wrap an already-normalized pair as returned by the exchange
    pub fn from_exchange(pair: impl Into<String>) -> Self {
        Self(pair.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base asset when the pair is quoted in `settlement`, otherwise the full pair
    pub fn display_name(&self, settlement: &str) -> &str {
        self.0
            .strip_suffix(settlement)
            .filter(|base| !base.is_empty())
            .unwrap_or(self.0.as_str())
    }

    /// Whether the pair is quoted in `quote`
    pub fn is_quoted_in(&self, quote: &str) -> bool {
        self.0.len() > quote.len() && self.0.ends_with(quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_asset_gets_settlement_suffix() {
        let s = Symbol::pair("btc", "USDT").unwrap();
        assert_eq!(s.as_str(), "BTCUSDT");
        assert_eq!(s.display_name("USDT"), "BTC");
    }

    #[test]
    fn test_full_pairs_are_kept() {
        assert_eq!(Symbol::pair("ethusdt", "USDT").unwrap().as_str(), "ETHUSDT");
        assert_eq!(Symbol::pair("ETH/BTC", "USDT").unwrap().as_str(), "ETHBTC");
        assert_eq!(Symbol::pair("sol-bnb", "USDT").unwrap().as_str(), "SOLBNB");
    }

    #[test]
    fn test_bases_ending_like_a_quote() {
        assert_eq!(Symbol::pair("wbtc", "USDT").unwrap().as_str(), "WBTCUSDT");
        assert_eq!(Symbol::pair("beth", "USDT").unwrap().as_str(), "BETHUSDT");
        assert_eq!(Symbol::pair("WBETH", "USDT").unwrap().as_str(), "WBETHUSDT");
        assert_eq!(Symbol::pair("steth", "USDT").unwrap().as_str(), "STETHUSDT");
    }

    #[test]
    fn test_quote_asset_alone_is_a_base() {
        assert_eq!(Symbol::pair("BTC", "USDT").unwrap().as_str(), "BTCUSDT");
        assert_eq!(Symbol::pair("bnb", "USDT").unwrap().as_str(), "BNBUSDT");
    }

    #[test]
    fn test_invalid_symbols() {
        assert!(Symbol::pair("  ", "USDT").is_err());
        assert!(Symbol::pair("BTC$", "USDT").is_err());
        assert!(Symbol::pair("/", "USDT").is_err());
    }

    #[test]
    fn test_is_quoted_in() {
        let s = Symbol::from_exchange("ethbtc");
        assert!(s.is_quoted_in("BTC"));
        assert!(!s.is_quoted_in("USDT"));
        assert!(!Symbol::from_exchange("BTC").is_quoted_in("BTC"));
    }
}
