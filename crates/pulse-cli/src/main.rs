//! Command-line interface for market-pulse
//!
//! One-shot reports and alarm management against the same data directory the
//! bot uses.

mod table;

use clap::{Parser, Subcommand};
use market_pulse::history::now_timestamp;
use market_pulse::{PruneTarget, PulseConfig, PulseService};
use pulse_utils::{LogFormat, init_tracing};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pulse")]
#[command(about = "Crypto market pulse reports", long_about = None)]
struct Cli {
    /// Directory holding the history files (overrides PULSE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Market strength report
    Ap,
    /// Order flow report
    Io {
        /// Symbol such as BTC or ETH/BTC; the default set when omitted
        symbol: Option<String>,
    },
    /// Short vs long order flow ratio
    Mts { symbol: String },
    /// Volume-weighted order flow of the NPR basket
    Npr,
    /// Price of one symbol
    P { symbol: String },
    /// Price report of a configured list
    Prices {
        list: String,
        /// Render as a table
        #[arg(long = "table")]
        as_table: bool,
    },
    /// Manage alarms
    Alarm {
        #[command(subcommand)]
        action: AlarmAction,
    },
    /// Wipe stored history: all, ap, io, prices or alarms
    Clear { target: PruneTarget },
    /// Apply the configured retention now
    Prune,
}

#[derive(Subcommand, Debug)]
enum AlarmAction {
    /// `HH:MM cmd...` or `YYYY-MM-DD HH:MM cmd...`
    Add {
        #[arg(required = true, num_args = 2..)]
        request: Vec<String>,
    },
    /// List alarms
    List,
    /// Delete an alarm by id
    Delete { id: usize },
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pulse_utils::load_dotenv();
    init_tracing(LogFormat::from_env(), "warn");

    let cli = Cli::parse();

    let mut builder = PulseConfig::builder().with_env();
    if let Some(dir) = cli.data_dir {
        builder = builder.data_dir(dir);
    }
    let config = builder.build()?;
    let settlement = config.settlement_currency.clone();

    let service = PulseService::with_binance(config)?;
    let formatter = service.formatter();
    let json = cli.json;

    info!(command = ?cli.command, "Running command");

    match cli.command {
        Commands::Ap => {
            let report = service.compute_ap().await?;
            emit(json, &report, |r| formatter.format_ap(r))
        }
        Commands::Io { symbol } => {
            let symbol = symbol.map(|s| service.symbol(&s)).transpose()?;
            let reports = service.io_report(symbol.as_ref()).await?;
            emit(json, &reports, |r| formatter.format_io(r))
        }
        Commands::Mts { symbol } => {
            let symbol = service.symbol(&symbol)?;
            let signal = service.compute_mts(&symbol).await;
            emit(json, &signal, |s| formatter.format_mts(&symbol, s))
        }
        Commands::Npr => {
            let (flows, basket) = service.npr_report().await?;
            emit(json, &flows, |f| formatter.format_npr(f, basket))
        }
        Commands::P { symbol } => {
            let report = service.symbol_price(&symbol).await?;
            emit(json, &report, |r| formatter.format_prices(r))
        }
        Commands::Prices { list, as_table } => {
            let report = service.price_report(&list).await?;
            emit(json, &report, |r| {
                if as_table {
                    format!("{}\n{}", r.list, table::prices(r, &settlement))
                } else {
                    formatter.format_prices(r)
                }
            })
        }
        Commands::Alarm { action } => match action {
            AlarmAction::Add { request } => {
                let request = request.join(" ");
                let id = service.register_alarm(&request, now_timestamp()).await?;
                println!("Alarm #{id} set: {request}");
                Ok(())
            }
            AlarmAction::List => {
                let alarms = service.list_alarms().await?;
                emit(json, &alarms, |a| table::alarms(a).to_string())
            }
            AlarmAction::Delete { id } => {
                service.delete_alarm(id).await?;
                println!("Alarm #{id} deleted");
                Ok(())
            }
        },
        Commands::Clear { target } => {
            let report = service.prune_history(target).await?;
            println!("Cleared {target}: {} rows removed", report.removed);
            Ok(())
        }
        Commands::Prune => {
            let report = service.apply_retention(now_timestamp())?;
            println!("Removed {} rows, kept {}", report.removed, report.kept);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_alarm_add() {
        let cli = Cli::try_parse_from(["pulse", "alarm", "add", "09:30", "ap", "npr"]).unwrap();
        match cli.command {
            Commands::Alarm {
                action: AlarmAction::Add { request },
            } => assert_eq!(request.join(" "), "09:30 ap npr"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_clear_target() {
        let cli = Cli::try_parse_from(["pulse", "clear", "prices"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Clear {
                target: PruneTarget::Prices
            }
        ));
        assert!(Cli::try_parse_from(["pulse", "clear", "everything"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["pulse", "npr", "--json", "--data-dir", "/tmp/p"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/p")));
    }
}
