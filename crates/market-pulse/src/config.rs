//! Configuration for market-pulse

use crate::error::{PulseError, Result};
use crate::history::RetentionPolicy;
use crate::market::Interval;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum quote volumes a pair needs to enter each strength bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthThresholds {
    /// Pairs quoted in BTC
    pub btc_min_volume: f64,
    /// Pairs quoted in the settlement currency
    pub settlement_min_volume: f64,
    /// Any pair
    pub long_term_min_volume: f64,
}

impl Default for StrengthThresholds {
    fn default() -> Self {
        Self {
            btc_min_volume: 10.0,
            settlement_min_volume: 1_000_000.0,
            long_term_min_volume: 5_000_000.0,
        }
    }
}

/// Configuration for market-pulse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Binance REST base URL
    pub api_base: String,

    /// Per-request deadline for market-data calls
    pub request_timeout: Duration,

    /// Quote asset appended to bare symbols
    pub settlement_currency: String,

    /// Volume filters for the AP buckets
    pub thresholds: StrengthThresholds,

    /// Number of candles per IO computation
    pub candle_limit: usize,

    /// Intervals shown in the IO report
    pub io_intervals: Vec<Interval>,

    /// Short side of the MTS ratio
    pub mts_short: Interval,

    /// Long side of the MTS ratio
    pub mts_long: Interval,

    /// Intervals of the NPR trend report
    pub npr_intervals: Vec<Interval>,

    /// Basket used by the NPR report
    pub npr_symbols: Vec<String>,

    /// Symbols used by `/io` without arguments
    pub default_io_symbols: Vec<String>,

    /// Named symbol lists for price reports
    pub price_lists: BTreeMap<String, Vec<String>>,

    /// Directory holding the history CSV files
    pub data_dir: PathBuf,

    /// Retention applied by the scheduled prune
    pub retention: RetentionPolicy,

    /// How often the scheduled prune runs
    pub prune_interval: Duration,

    /// Alarm scheduler resolution
    pub scheduler_tick: Duration,

    /// Keep-alive URL pinged by the heartbeat task
    pub heartbeat_url: Option<String>,

    /// Heartbeat period
    pub heartbeat_interval: Duration,

    /// Telegram bot token used to deliver alarm reports
    pub telegram_token: Option<String>,

    /// Chat that receives alarm reports
    pub notify_chat_id: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for PulseConfig {
    fn default() -> Self {
        let mut price_lists = BTreeMap::new();
        price_lists.insert("majors".to_string(), strings(&["BTC", "ETH", "BNB"]));
        price_lists.insert(
            "alts".to_string(),
            strings(&["SOL", "XRP", "ADA", "AVAX", "DOGE"]),
        );

        Self {
            api_base: "https://api.binance.com".to_string(),
            request_timeout: Duration::from_secs(10),
            settlement_currency: "USDT".to_string(),
            thresholds: StrengthThresholds::default(),
            candle_limit: 100,
            io_intervals: vec![
                Interval::FifteenMinutes,
                Interval::OneHour,
                Interval::FourHours,
            ],
            mts_short: Interval::FifteenMinutes,
            mts_long: Interval::FourHours,
            npr_intervals: vec![
                Interval::FifteenMinutes,
                Interval::OneHour,
                Interval::FourHours,
            ],
            npr_symbols: strings(&["BTC", "ETH", "BNB", "SOL", "XRP"]),
            default_io_symbols: strings(&["BTC", "ETH", "BNB", "SOL"]),
            price_lists,
            data_dir: PathBuf::from("data"),
            retention: RetentionPolicy::default(),
            prune_interval: Duration::from_secs(24 * 3600), // daily
            scheduler_tick: Duration::from_secs(20),
            heartbeat_url: None,
            heartbeat_interval: Duration::from_secs(300), // 5 minutes
            telegram_token: None,
            notify_chat_id: None,
        }
    }
}

impl PulseConfig {
    /// Create a new configuration builder
    pub fn builder() -> PulseConfigBuilder {
        PulseConfigBuilder::default()
    }

    /// Build a configuration from the process environment (and `.env`)
    pub fn from_env() -> Result<Self> {
        pulse_utils::load_dotenv();
        Self::builder().with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.settlement_currency.is_empty() {
            return Err(PulseError::Config(
                "settlement_currency must not be empty".to_string(),
            ));
        }

        if self.candle_limit == 0 || self.candle_limit > 1000 {
            return Err(PulseError::Config(
                "candle_limit must be between 1 and 1000".to_string(),
            ));
        }

        if self.scheduler_tick.is_zero() || self.scheduler_tick > Duration::from_secs(60) {
            return Err(PulseError::Config(
                "scheduler_tick must be between 1ms and 60s".to_string(),
            ));
        }

        if self.prune_interval.is_zero() || self.heartbeat_interval.is_zero() {
            return Err(PulseError::Config(
                "prune_interval and heartbeat_interval must be positive".to_string(),
            ));
        }

        if self.telegram_token.is_some() && self.notify_chat_id.is_none() {
            return Err(PulseError::Config(
                "CHAT_ID is required when TELEGRAM_TOKEN is set".to_string(),
            ));
        }

        // List names end up in file names
        let valid = |name: &str| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if let Some(bad) = self.price_lists.keys().find(|name| !valid(name)) {
            return Err(PulseError::Config(format!("Invalid price list name: {bad:?}")));
        }

        Ok(())
    }

    /// Symbols of a named price list
    pub fn price_list(&self, name: &str) -> Option<&[String]> {
        self.price_lists
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
    }
}

/// Builder for PulseConfig
#[derive(Debug, Default)]
pub struct PulseConfigBuilder {
    api_base: Option<String>,
    request_timeout: Option<Duration>,
    settlement_currency: Option<String>,
    candle_limit: Option<usize>,
    npr_symbols: Option<Vec<String>>,
    default_io_symbols: Option<Vec<String>>,
    price_lists: BTreeMap<String, Vec<String>>,
    data_dir: Option<PathBuf>,
    retention: Option<RetentionPolicy>,
    scheduler_tick: Option<Duration>,
    heartbeat_url: Option<String>,
    heartbeat_interval: Option<Duration>,
    telegram_token: Option<String>,
    notify_chat_id: Option<String>,
}

impl PulseConfigBuilder {
    /// Set the market-data base URL
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the settlement currency
    pub fn settlement_currency(mut self, currency: impl Into<String>) -> Self {
        self.settlement_currency = Some(currency.into().to_uppercase());
        self
    }

    /// Set the candle limit for IO computations
    pub fn candle_limit(mut self, limit: usize) -> Self {
        self.candle_limit = Some(limit);
        self
    }

    /// Set the NPR basket
    pub fn npr_symbols(mut self, symbols: Vec<String>) -> Self {
        self.npr_symbols = Some(symbols);
        self
    }

    /// Set the default IO symbols
    pub fn default_io_symbols(mut self, symbols: Vec<String>) -> Self {
        self.default_io_symbols = Some(symbols);
        self
    }

    /// Add or replace a named price list
    pub fn price_list(mut self, name: impl Into<String>, symbols: Vec<String>) -> Self {
        self.price_lists.insert(name.into().to_lowercase(), symbols);
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the retention policy
    pub fn retention(mut self, policy: RetentionPolicy) -> Self {
        self.retention = Some(policy);
        self
    }

    /// Set the scheduler tick
    pub fn scheduler_tick(mut self, tick: Duration) -> Self {
        self.scheduler_tick = Some(tick);
        self
    }

    /// Set the heartbeat URL
    pub fn heartbeat_url(mut self, url: impl Into<String>) -> Self {
        self.heartbeat_url = Some(url.into());
        self
    }

    /// Set the heartbeat period
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Set Telegram delivery credentials
    pub fn telegram(mut self, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        self.telegram_token = Some(token.into());
        self.notify_chat_id = Some(chat_id.into());
        self
    }

    /// Load every supported setting from the environment
    pub fn with_env(mut self) -> Self {
        if let Some(url) = pulse_utils::env_opt("BINANCE_API_BASE") {
            self.api_base = Some(url);
        }
        if let Some(dir) = pulse_utils::env_opt("PULSE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(token) = pulse_utils::env_opt("TELEGRAM_TOKEN") {
            self.telegram_token = Some(token);
        }
        if let Some(chat) = pulse_utils::env_opt("CHAT_ID") {
            self.notify_chat_id = Some(chat);
        }
        if let Some(url) = pulse_utils::env_opt("HEARTBEAT_URL") {
            self.heartbeat_url = Some(url);
        }
        if let Some(secs) = pulse_utils::env_opt("HEARTBEAT_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.heartbeat_interval = Some(Duration::from_secs(secs));
        }

        let defaults = RetentionPolicy::default();
        let max_age_days = pulse_utils::env_or("PULSE_RETENTION_DAYS", defaults.max_age_days);
        let max_records =
            pulse_utils::env_or("PULSE_RETENTION_MAX_RECORDS", defaults.max_records);
        self.retention = Some(RetentionPolicy::new(max_age_days, max_records));

        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PulseConfig> {
        let defaults = PulseConfig::default();

        let mut price_lists = defaults.price_lists;
        price_lists.extend(self.price_lists);

        let config = PulseConfig {
            api_base: self.api_base.unwrap_or(defaults.api_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            settlement_currency: self
                .settlement_currency
                .unwrap_or(defaults.settlement_currency),
            thresholds: defaults.thresholds,
            candle_limit: self.candle_limit.unwrap_or(defaults.candle_limit),
            io_intervals: defaults.io_intervals,
            mts_short: defaults.mts_short,
            mts_long: defaults.mts_long,
            npr_intervals: defaults.npr_intervals,
            npr_symbols: self.npr_symbols.unwrap_or(defaults.npr_symbols),
            default_io_symbols: self
                .default_io_symbols
                .unwrap_or(defaults.default_io_symbols),
            price_lists,
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            retention: self.retention.unwrap_or(defaults.retention),
            prune_interval: defaults.prune_interval,
            scheduler_tick: self.scheduler_tick.unwrap_or(defaults.scheduler_tick),
            heartbeat_url: self.heartbeat_url,
            heartbeat_interval: self
                .heartbeat_interval
                .unwrap_or(defaults.heartbeat_interval),
            telegram_token: self.telegram_token,
            notify_chat_id: self.notify_chat_id,
        };

        config.validate()?;
        Ok(config)
    }
}
