//! Shared utilities for market-pulse
//!
//! This crate provides the process-level plumbing used by the market-pulse
//! binaries: tracing setup and typed access to environment variables.

pub mod config;
pub mod logging;

pub use config::{LogFormat, env_opt, env_or, load_dotenv};
pub use logging::init_tracing;
