//! Chat front end
//!
//! Maps parsed [`Command`]s onto [`PulseService`] calls and renders the reply
//! text. The transport (REPL, Telegram, ...) only moves strings in and out.
//!
//! # Example
//!
//! ```rust,ignore
//! use market_pulse::{PulseBot, PulseConfig, PulseService};
//!
//! let service = PulseService::with_binance(PulseConfig::from_env()?)?;
//! let bot = PulseBot::new(service);
//! println!("{}", bot.reply("/ap").await);
//! ```

pub mod commands;

use crate::error::Result;
use crate::history::now_timestamp;
use crate::service::PulseService;
use tracing::debug;

pub use commands::Command;

/// Stateless command handler on top of the service
#[derive(Clone)]
pub struct PulseBot {
    service: PulseService,
    welcome_message: String,
}

impl PulseBot {
    pub fn new(service: PulseService) -> Self {
        Self {
            service,
            welcome_message: "✅ Market Pulse is running! Try /ap, /io, /p btc or /help".to_string(),
        }
    }

    /// Get the welcome message
    pub fn welcome(&self) -> &str {
        &self.welcome_message
    }

    pub fn service(&self) -> &PulseService {
        &self.service
    }

    /// Process user input; errors are rendered into the reply
    pub async fn reply(&self, input: &str) -> String {
        match self.process_input(input).await {
            Ok(text) => text,
            Err(e) => self.service.formatter().format_error(&e),
        }
    }

    /// Process user input and return a response
    pub async fn process_input(&self, input: &str) -> Result<String> {
        let command = Command::parse(input)?;
        debug!(command = command.description(), "Executing command");
        self.execute_command(command).await
    }

    /// Execute a parsed command
    pub async fn execute_command(&self, command: Command) -> Result<String> {
        let service = &self.service;
        let formatter = service.formatter();

        match command {
            Command::Start => Ok(self.welcome_message.clone()),
            Command::Help => Ok(Command::help_text().trim().to_string()),
            Command::Ap => Ok(formatter.format_ap(&service.compute_ap().await?)),
            Command::Io { symbol } => {
                let symbol = symbol.map(|s| service.symbol(&s)).transpose()?;
                Ok(formatter.format_io(&service.io_report(symbol.as_ref()).await?))
            }
            Command::Mts { symbol } => {
                let symbol = service.symbol(&symbol)?;
                let signal = service.compute_mts(&symbol).await;
                Ok(formatter.format_mts(&symbol, &signal))
            }
            Command::Npr => {
                let (flows, basket) = service.npr_report().await?;
                Ok(formatter.format_npr(&flows, basket))
            }
            Command::Price { symbol } => {
                Ok(formatter.format_prices(&service.symbol_price(&symbol).await?))
            }
            Command::Prices { list } => {
                Ok(formatter.format_prices(&service.price_report(&list).await?))
            }
            Command::Alarm { request } => {
                let id = service.register_alarm(&request, now_timestamp()).await?;
                Ok(format!("⏰ Alarm #{id} set: {request}"))
            }
            Command::Alarms => Ok(formatter.format_alarms(&service.list_alarms().await?)),
            Command::DelAlarm { id } => {
                service.delete_alarm(id).await?;
                Ok(format!("🗑️ Alarm #{id} deleted"))
            }
            Command::Clear { target } => {
                let report = service.prune_history(target).await?;
                Ok(format!("🧹 Cleared {target}: {} rows removed", report.removed))
            }
            Command::Exit => Ok("Bye".to_string()),
        }
    }
}
