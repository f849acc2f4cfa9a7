//! Report commands an alarm runs when it fires

use crate::config::PulseConfig;
use crate::error::{PulseError, Result};
use crate::market::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// One report an alarm composes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportCommand {
    /// AP strength report
    Ap,
    /// Price report of a configured list
    PriceList(String),
    /// IO report of one symbol, or of the default set
    Io(Option<Symbol>),
    /// NPR report
    Npr,
}

impl ReportCommand {
    /// Parse one token.
    ///
    /// Accepted: `ap`, `npr`, `io`, `io:SYM`, `prices:LIST`, `p:LIST`, or a
    /// bare configured list name.
    pub fn parse(token: &str, config: &PulseConfig) -> Result<Self> {
        Self::parse_with(token, config, |arg| Symbol::pair(arg, &config.settlement_currency))
    }

    /// Parse one token of a stored command list, where `io:` already carries a full pair
    pub fn decode(token: &str, config: &PulseConfig) -> Result<Self> {
        Self::parse_with(token, config, |arg| {
            let pair = arg.trim();
            if pair.is_empty() || !pair.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(PulseError::Command(format!("bad stored pair: {arg:?}")));
            }
            Ok(Symbol::from_exchange(pair))
        })
    }

    fn parse_with<F>(token: &str, config: &PulseConfig, pair: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Symbol>,
    {
        let token = token.trim();
        let lower = token.to_lowercase();

        match lower.as_str() {
            "ap" => return Ok(Self::Ap),
            "npr" => return Ok(Self::Npr),
            "io" => return Ok(Self::Io(None)),
            _ => {}
        }

        if let Some((kind, arg)) = token.split_once(':') {
            return match kind.to_lowercase().as_str() {
                "io" => pair(arg).map(|s| Self::Io(Some(s))),
                "prices" | "p" => Self::price_list(arg, config),
                _ => Err(PulseError::Command(format!("unknown command: {token}"))),
            };
        }

        Self::price_list(token, config)
    }

    fn price_list(name: &str, config: &PulseConfig) -> Result<Self> {
        let name = name.trim().to_lowercase();
        if config.price_list(&name).is_some() {
            Ok(Self::PriceList(name))
        } else {
            Err(PulseError::Command(format!("unknown price list: {name}")))
        }
    }
}

impl fmt::Display for ReportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ap => f.write_str("ap"),
            Self::PriceList(name) => write!(f, "prices:{name}"),
            Self::Io(None) => f.write_str("io"),
            Self::Io(Some(symbol)) => write!(f, "io:{symbol}"),
            Self::Npr => f.write_str("npr"),
        }
    }
}

/// Parse a whitespace or comma separated command list.
///
/// Unknown tokens are skipped with a warning; a list with nothing usable left
/// is rejected.
pub fn parse_commands<'a, I>(tokens: I, config: &PulseConfig) -> Result<Vec<ReportCommand>>
where
    I: IntoIterator<Item = &'a str>,
{
    collect_commands(tokens, |token| ReportCommand::parse(token, config))
}

/// Decode the stored form written by [`encode_commands`]
pub fn decode_commands(stored: &str, config: &PulseConfig) -> Result<Vec<ReportCommand>> {
    collect_commands(stored.split_whitespace(), |token| ReportCommand::decode(token, config))
}

fn collect_commands<'a, I, F>(tokens: I, parse: F) -> Result<Vec<ReportCommand>>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> Result<ReportCommand>,
{
    let commands: Vec<ReportCommand> = tokens
        .into_iter()
        .flat_map(|t| t.split(','))
        .filter(|t| !t.trim().is_empty())
        .filter_map(|token| match parse(token) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                warn!(token, error = %e, "Skipping alarm command");
                None
            }
        })
        .collect();

    if commands.is_empty() {
        return Err(PulseError::Validation(
            "alarm needs at least one of: ap, io, io:SYM, npr, prices:LIST".to_string(),
        ));
    }
    Ok(commands)
}

/// Stored form of a command list
pub fn encode_commands(commands: &[ReportCommand]) -> String {
    commands
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
