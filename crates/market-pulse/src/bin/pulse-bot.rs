//! Market Pulse bot
//!
//! An interactive command-line front end over the chat commands, with the
//! alarm loop, retention job and heartbeat running in the background. Alarm
//! reports go to Telegram when `TELEGRAM_TOKEN` and `CHAT_ID` are set, and to
//! stdout otherwise.
//!
//! # Usage
//!
//! ```bash
//! export TELEGRAM_TOKEN="123:abc"
//! export CHAT_ID="42"
//! export PULSE_DATA_DIR="./data"
//!
//! cargo run --bin pulse-bot -p market-pulse
//! ```

use market_pulse::{
    Command, Heartbeat, PulseBot, PulseConfig, PulseService, ReportSink, StdoutSink, TelegramSink,
};
use pulse_utils::{LogFormat, init_tracing};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

const PROMPT: &str = "pulse> ";

fn print_banner() {
    println!(
        r"
╔══════════════════════════════════════════════════╗
║                  Market Pulse                    ║
║                                                  ║
║  /ap  /io [sym]  /mts <sym>  /npr                ║
║  /p <sym>  /prices <list>                        ║
║  /alarm HH:MM <cmds>   /alarms   /delalarm <id>  ║
║  /clear <target>   /help   /exit                 ║
╚══════════════════════════════════════════════════╝
"
    );
}

fn notification_sink(config: &PulseConfig) -> anyhow::Result<Arc<dyn ReportSink>> {
    match (&config.telegram_token, &config.notify_chat_id) {
        (Some(token), Some(chat_id)) => {
            info!(chat_id = %chat_id, "Alarm reports go to Telegram");
            Ok(Arc::new(TelegramSink::new(
                token,
                chat_id.clone(),
                config.request_timeout,
            )?))
        }
        _ => {
            info!("No Telegram destination configured, alarm reports go to stdout");
            Ok(Arc::new(StdoutSink))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pulse_utils::load_dotenv();
    init_tracing(LogFormat::from_env(), "warn,market_pulse=info");

    print_banner();

    let config = PulseConfig::from_env()?;
    println!("Configuration:");
    println!("  API Base: {}", config.api_base);
    println!("  Data dir: {}", config.data_dir.display());
    println!();

    let sink = notification_sink(&config)?;
    let heartbeat = config
        .heartbeat_url
        .as_ref()
        .map(|url| Heartbeat::new(url.clone(), config.heartbeat_interval, config.request_timeout))
        .transpose()?;

    let service = PulseService::with_binance(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let alarm_loop = service.spawn(sink, shutdown_rx.clone());
    let heartbeat = heartbeat.map(|hb| hb.spawn(shutdown_rx));

    let bot = PulseBot::new(service);
    println!("{}\n", bot.welcome());

    // Run REPL
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{PROMPT}");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                // EOF
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                continue;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if matches!(Command::parse(input), Ok(Command::Exit)) {
            println!("Goodbye!");
            break;
        }

        println!("{}\n", bot.reply(input).await);
    }

    // ignore send errors: the loops may already be gone
    let _ = shutdown_tx.send(true);
    alarm_loop.await?;
    if let Some(handle) = heartbeat {
        handle.await?;
    }
    Ok(())
}
