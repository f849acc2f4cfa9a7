//! Chat command parsing
//!
//! Commands are slash-prefixed words with whitespace separated arguments. A
//! Telegram style `@botname` suffix on the command word is ignored.

use crate::error::{PulseError, Result};
use crate::service::PruneTarget;

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Greeting
    Start,
    /// Show help
    Help,
    /// AP strength report
    Ap,
    /// IO report for one symbol or the default set
    Io { symbol: Option<String> },
    /// MTS ratio of one symbol
    Mts { symbol: String },
    /// NPR trend report
    Npr,
    /// Price line of one symbol
    Price { symbol: String },
    /// Price report of a configured list
    Prices { list: String },
    /// Register an alarm; `request` is `HH:MM cmd...` or `YYYY-MM-DD HH:MM cmd...`
    Alarm { request: String },
    /// List alarms
    Alarms,
    /// Delete an alarm by id
    DelAlarm { id: usize },
    /// Wipe history
    Clear { target: PruneTarget },
    /// Leave the REPL
    Exit,
}

fn usage(text: &str) -> PulseError {
    PulseError::Command(format!("Usage: {text}"))
}

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PulseError::Command("Empty input".to_string()));
        }

        let Some(body) = input.strip_prefix('/') else {
            return Err(PulseError::Command(format!(
                "Not a command: {input:?}. Try /help"
            )));
        };

        let parts: Vec<&str> = body.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Err(PulseError::Command("Empty command".to_string()));
        };

        let cmd = first.split('@').next().unwrap_or_default().to_lowercase();
        let args = &parts[1..];

        match cmd.as_str() {
            "start" => Ok(Command::Start),
            "help" | "h" | "?" => Ok(Command::Help),
            "ap" => Ok(Command::Ap),
            "io" => Ok(Command::Io {
                symbol: args.first().map(|s| s.to_uppercase()),
            }),
            "mts" => {
                let symbol = args.first().ok_or_else(|| usage("/mts <symbol>"))?;
                Ok(Command::Mts {
                    symbol: symbol.to_uppercase(),
                })
            }
            "npr" => Ok(Command::Npr),
            "p" | "price" => {
                let symbol = args.first().ok_or_else(|| usage("/p <symbol>"))?;
                Ok(Command::Price {
                    symbol: symbol.to_uppercase(),
                })
            }
            "prices" => {
                let list = args.first().ok_or_else(|| usage("/prices <list>"))?;
                Ok(Command::Prices {
                    list: list.to_lowercase(),
                })
            }
            "alarm" => {
                if args.len() < 2 {
                    return Err(usage(
                        "/alarm HH:MM <commands> or /alarm YYYY-MM-DD HH:MM <commands>",
                    ));
                }
                Ok(Command::Alarm {
                    request: args.join(" "),
                })
            }
            "alarms" => Ok(Command::Alarms),
            "delalarm" => {
                let raw = args.first().ok_or_else(|| usage("/delalarm <id>"))?;
                let id = raw.parse().map_err(|_| {
                    PulseError::Validation(format!("alarm id must be a number: {raw}"))
                })?;
                Ok(Command::DelAlarm { id })
            }
            "clear" => {
                let raw = args
                    .first()
                    .ok_or_else(|| usage("/clear all|ap|io|prices|alarms"))?;
                Ok(Command::Clear {
                    target: raw.parse()?,
                })
            }
            "exit" | "quit" | "q" => Ok(Command::Exit),
            _ => Err(PulseError::Command(format!("Unknown command: /{cmd}"))),
        }
    }

    /// Help text listing every command
    pub fn help_text() -> &'static str {
        r"
Market Pulse Commands
=====================

Reports:
  /ap                      Market strength (BTC, USDT and long-term buckets)
  /io [symbol]             Order flow per interval with 24h stats
  /mts <symbol>            Short vs long order flow ratio
  /npr                     Volume-weighted order flow of the NPR basket
  /p <symbol>              Price, 24h change and volume
  /prices <list>           Price report of a configured list

Alarms:
  /alarm HH:MM <cmds>             Every day at HH:MM
  /alarm YYYY-MM-DD HH:MM <cmds>  Once
      cmds: ap, io, io:SYM, npr, prices:LIST
  /alarms                  List alarms
  /delalarm <id>           Delete an alarm (later ids shift down)

Other:
  /clear all|ap|io|prices|alarms   Wipe stored history
  /help                    Show help
  /exit                    Exit
"
    }

    /// Get a short description of the command
    pub fn description(&self) -> &'static str {
        match self {
            Command::Start => "Greeting",
            Command::Help => "Show help",
            Command::Ap => "Market strength report",
            Command::Io { .. } => "Order flow report",
            Command::Mts { .. } => "Momentum ratio",
            Command::Npr => "Net flow report",
            Command::Price { .. } => "Symbol price",
            Command::Prices { .. } => "Price list report",
            Command::Alarm { .. } => "Register alarm",
            Command::Alarms => "List alarms",
            Command::DelAlarm { .. } => "Delete alarm",
            Command::Clear { .. } => "Clear history",
            Command::Exit => "Exit the bot",
        }
    }
}
