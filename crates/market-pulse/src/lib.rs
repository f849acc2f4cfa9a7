//! Crypto market pulse bot core
//!
//! This crate polls the Binance spot REST API, derives aggregate indicators
//! and reports them on demand or on a schedule. It includes:
//!
//! - AP: market strength of the BTC-quoted, USDT-quoted and high-volume buckets
//! - IO: buy/sell order flow ratio from candle direction
//! - MTS: short vs long interval order flow
//! - NPR: volume-weighted order flow of a symbol basket
//! - Price list reports with deltas against the last recorded price
//! - Daily and one-off alarms that re-run a composed set of reports
//! - CSV history with retention pruning
//!
//! # Architecture
//!
//! - [`MarketSnapshotSource`]: market-data boundary, implemented by [`BinanceClient`]
//! - [`IndicatorEngine`]: turns snapshots into scores, degrading on fetch failures
//! - [`HistoryStore`]: append-only CSV streams with atomic rewrites
//! - [`AlarmScheduler`]: min-heap of pending alarm firings
//! - [`PulseService`]: ties the above together behind one facade
//! - [`ReportFormatter`] and [`ReportSink`]: rendering and delivery
//!
//! # Example
//!
//! ```rust,ignore
//! use market_pulse::{PulseConfig, PulseService, StdoutSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = PulseService::with_binance(PulseConfig::from_env()?)?;
//!
//!     let report = service.compute_ap().await?;
//!     println!("{}", service.formatter().format_ap(&report));
//!
//!     service.register_alarm("09:30 ap npr", market_pulse::history::now_timestamp()).await?;
//!     let (_tx, rx) = tokio::sync::watch::channel(false);
//!     service.run(Arc::new(StdoutSink), rx).await;
//!     Ok(())
//! }
//! ```

pub mod alarms;
pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod history;
pub mod indicators;
pub mod market;
pub mod report;
pub mod service;

// Re-export main types for convenience
pub use alarms::{AlarmDefinition, AlarmScheduler, FireSpec, ReportCommand};
pub use api::BinanceClient;
pub use bot::{Command, PulseBot};
pub use config::{PulseConfig, StrengthThresholds};
pub use error::{PulseError, Result};
pub use heartbeat::Heartbeat;
pub use history::{HistoryStore, RetentionPolicy, Stream};
pub use indicators::IndicatorEngine;
pub use market::{Interval, MarketSnapshotSource, Symbol};
pub use report::{ReportFormatter, ReportSink, StdoutSink, TelegramSink};
pub use service::{PruneTarget, PulseService};
