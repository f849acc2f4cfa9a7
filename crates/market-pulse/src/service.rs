//! PulseService: the core facade used by the chat layer, the CLI and alarms
//!
//! Report computations run concurrently and only touch the history store,
//! whose own lock serializes each append. Alarm registration, deletion, firing
//! bookkeeping and alarm wipes go through the scheduler's async mutex. Under
//! that lock the scheduler is first synced with `alarms.csv`, so changes made
//! by another process on the same data directory (the `pulse` CLI) are seen
//! before any alarm fires or any id is resolved.

use crate::alarms::{AlarmDefinition, AlarmRequest, AlarmScheduler, FiredAlarm, ReportCommand};
use crate::api::BinanceClient;
use crate::config::PulseConfig;
use crate::error::{PulseError, Result};
use crate::history::{
    AlarmRecord, ApRecord, HistoryStore, IoRecord, PriceRecord, PruneReport, RetentionPolicy,
    Stream, now_timestamp,
};
use crate::indicators::{IndicatorEngine, MomentumSignal, NetFlow};
use crate::market::{Interval, MarketSnapshotSource, Symbol};
use crate::report::{ApReport, IoReport, PriceReport, PriceRow, ReportFormatter, ReportSink};
use chrono::NaiveDateTime;
use futures::future::join_all;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Price stream used by single-symbol lookups
pub const ADHOC_PRICE_LIST: &str = "adhoc";

/// What `/clear` wipes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneTarget {
    All,
    Ap,
    Io,
    Prices,
    Alarms,
}

impl FromStr for PruneTarget {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "ap" => Ok(Self::Ap),
            "io" => Ok(Self::Io),
            "prices" | "p" => Ok(Self::Prices),
            "alarms" | "alarm" => Ok(Self::Alarms),
            other => Err(PulseError::Validation(format!(
                "unknown clear target {other:?}, expected all|ap|io|prices|alarms"
            ))),
        }
    }
}

impl fmt::Display for PruneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Ap => "ap",
            Self::Io => "io",
            Self::Prices => "prices",
            Self::Alarms => "alarms",
        })
    }
}

/// Core operations of the bot
#[derive(Clone)]
pub struct PulseService {
    engine: IndicatorEngine,
    store: Arc<HistoryStore>,
    scheduler: Arc<Mutex<AlarmScheduler>>,
    formatter: ReportFormatter,
    config: Arc<PulseConfig>,
}

impl PulseService {
    /// Open the data directory and restore the alarm schedule
    pub fn new(source: Arc<dyn MarketSnapshotSource>, config: PulseConfig) -> Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(HistoryStore::open(&config.data_dir)?);

        let mut scheduler = AlarmScheduler::new();
        let rows = store.records::<AlarmRecord>(&Stream::Alarms)?;
        scheduler.restore(&rows, &config, now_timestamp());
        info!(
            data_dir = %config.data_dir.display(),
            alarms = scheduler.len(),
            pending = scheduler.pending(),
            "Pulse service ready"
        );

        Ok(Self {
            engine: IndicatorEngine::new(source, Arc::clone(&config)),
            store,
            scheduler: Arc::new(Mutex::new(scheduler)),
            formatter: ReportFormatter::new(config.settlement_currency.clone()),
            config,
        })
    }

    /// Service backed by the Binance REST API
    pub fn with_binance(config: PulseConfig) -> Result<Self> {
        let client = BinanceClient::new(config.api_base.clone(), config.request_timeout)?;
        Self::new(Arc::new(client), config)
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn formatter(&self) -> &ReportFormatter {
        &self.formatter
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn symbol(&self, raw: &str) -> Result<Symbol> {
        self.engine.symbol(raw)
    }

    fn symbols(&self, raw: &[String]) -> Result<Vec<Symbol>> {
        raw.iter().map(|s| self.symbol(s)).collect()
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    /// AP scores with the previous record for deltas.
    ///
    /// Only complete triples are recorded, so a degraded run never becomes the
    /// baseline of the next delta.
    pub async fn compute_ap(&self) -> Result<ApReport> {
        let scores = self.engine.strength().await;
        let previous = self.store.previous::<ApRecord>(&Stream::Ap)?;

        if scores.is_degraded() {
            warn!("AP degraded, not recorded");
        } else {
            self.store.append(
                &Stream::Ap,
                &ApRecord {
                    timestamp: now_timestamp(),
                    btc_strength: scores.btc.score,
                    usdt_strength: scores.usdt.score,
                    long_term_strength: scores.long_term.score,
                },
            )?;
        }

        Ok(ApReport { scores, previous })
    }

    /// IO ratios and 24h statistics of one symbol
    pub async fn compute_io(&self, symbol: &Symbol, intervals: &[Interval]) -> Result<IoReport> {
        let (scores, ticker) = futures::join!(
            self.engine.order_flows(symbol, intervals),
            self.engine.ticker(symbol),
        );

        let ticker = ticker
            .inspect_err(|e| warn!(symbol = %symbol, error = %e, "24h fetch failed"))
            .ok();

        if scores.iter().any(|s| s.score.is_some()) {
            let ratios: Vec<(Interval, Option<f64>)> =
                scores.iter().map(|s| (s.interval, s.score)).collect();
            self.store.append(
                &Stream::Io,
                &IoRecord::new(now_timestamp(), symbol.as_str(), &ratios),
            )?;
        }

        Ok(IoReport {
            symbol: symbol.clone(),
            scores,
            ticker,
        })
    }

    /// IO report of one symbol, or of the default set
    pub async fn io_report(&self, symbol: Option<&Symbol>) -> Result<Vec<IoReport>> {
        let symbols = match symbol {
            Some(s) => vec![s.clone()],
            None => self.symbols(&self.config.default_io_symbols)?,
        };
        let intervals = &self.config.io_intervals;

        join_all(symbols.iter().map(|s| self.compute_io(s, intervals)))
            .await
            .into_iter()
            .collect()
    }

    pub async fn compute_mts(&self, symbol: &Symbol) -> MomentumSignal {
        self.engine.momentum(symbol).await
    }

    pub async fn compute_npr(&self, symbols: &[Symbol], intervals: &[Interval]) -> Vec<NetFlow> {
        self.engine.net_flow(symbols, intervals).await
    }

    /// NPR over the configured basket and intervals
    pub async fn npr_report(&self) -> Result<(Vec<NetFlow>, usize)> {
        let symbols = self.symbols(&self.config.npr_symbols)?;
        let flows = self.compute_npr(&symbols, &self.config.npr_intervals).await;
        Ok((flows, symbols.len()))
    }

    /// Prices of a configured list, recorded in that list's stream
    pub async fn price_report(&self, list: &str) -> Result<PriceReport> {
        let list = list.trim().to_lowercase();
        let raw = self
            .config
            .price_list(&list)
            .ok_or_else(|| PulseError::NotFound(format!("price list {list:?}")))?
            .to_vec();
        let symbols = self.symbols(&raw)?;
        self.record_prices(&list, symbols).await
    }

    /// Price line of a single symbol
    pub async fn symbol_price(&self, raw: &str) -> Result<PriceReport> {
        let symbol = self.symbol(raw)?;
        self.record_prices(ADHOC_PRICE_LIST, vec![symbol]).await
    }

    async fn record_prices(&self, list: &str, symbols: Vec<Symbol>) -> Result<PriceReport> {
        let stream = Stream::Prices(list.to_string());
        let tickers = join_all(symbols.iter().map(|s| self.engine.ticker(s))).await;
        let timestamp = now_timestamp();

        let mut rows = Vec::with_capacity(symbols.len());
        for (symbol, ticker) in symbols.into_iter().zip(tickers) {
            let previous_price = self
                .store
                .previous_where(&stream, |r: &PriceRecord| r.symbol == symbol.as_str())?
                .map(|r: PriceRecord| r.price);

            let ticker = match ticker {
                Ok(t) => {
                    self.store.append(
                        &stream,
                        &PriceRecord {
                            timestamp,
                            symbol: symbol.to_string(),
                            price: t.last_price,
                            change_percent: t.price_change_percent,
                        },
                    )?;
                    Some(t)
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Price fetch failed");
                    None
                }
            };

            rows.push(PriceRow {
                symbol,
                ticker,
                previous_price,
            });
        }

        Ok(PriceReport {
            list: list.to_string(),
            rows,
        })
    }

    /// Compute and render one report command
    pub async fn render(&self, command: &ReportCommand) -> Result<String> {
        match command {
            ReportCommand::Ap => Ok(self.formatter.format_ap(&self.compute_ap().await?)),
            ReportCommand::PriceList(list) => {
                Ok(self.formatter.format_prices(&self.price_report(list).await?))
            }
            ReportCommand::Io(symbol) => {
                Ok(self.formatter.format_io(&self.io_report(symbol.as_ref()).await?))
            }
            ReportCommand::Npr => {
                let (flows, basket) = self.npr_report().await?;
                Ok(self.formatter.format_npr(&flows, basket))
            }
        }
    }

    /// Run commands in order, sending each rendered report to `sink`.
    ///
    /// A failing command is reported as an error message; delivery failures
    /// are logged. Neither stops the remaining commands.
    pub async fn deliver(&self, commands: &[ReportCommand], sink: &dyn ReportSink) {
        for command in commands {
            let text = match self.render(command).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(command = %command, error = %e, "Report failed");
                    self.formatter.format_error(&e)
                }
            };
            if let Err(e) = sink.send(&text).await {
                error!(command = %command, error = %e, "Report delivery failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Alarms
    // ------------------------------------------------------------------

    /// Bring the scheduler in line with the alarm rows on disk
    fn sync_alarms(&self, scheduler: &mut AlarmScheduler, now: NaiveDateTime) -> Result<()> {
        let rows = self.store.records::<AlarmRecord>(&Stream::Alarms)?;
        if scheduler.sync(&rows, &self.config, now) {
            info!(alarms = scheduler.len(), "Alarm schedule reloaded from disk");
        }
        Ok(())
    }

    /// Validate, persist and schedule an alarm; returns its id
    pub async fn register_alarm(&self, input: &str, now: NaiveDateTime) -> Result<usize> {
        let request = AlarmRequest::parse(input, now, &self.config)?;
        let fire_spec = request.fire_spec;

        let mut scheduler = self.scheduler.lock().await;
        self.sync_alarms(&mut scheduler, now)?;
        self.store.append(&Stream::Alarms, &request.to_record(now))?;
        let id = scheduler.push(request, now);

        info!(id, fire_spec = %fire_spec, "Alarm registered");
        Ok(id)
    }

    /// Persisted alarms in id order; undecodable rows are skipped but keep their id
    pub async fn list_alarms(&self) -> Result<Vec<AlarmDefinition>> {
        let mut scheduler = self.scheduler.lock().await;
        let rows = self.store.records::<AlarmRecord>(&Stream::Alarms)?;
        if scheduler.sync(&rows, &self.config, now_timestamp()) {
            info!(alarms = scheduler.len(), "Alarm schedule reloaded from disk");
        }

        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let record = row.as_ref()?;
                AlarmDefinition::from_record(idx + 1, record, &self.config)
                    .inspect_err(|e| warn!(id = idx + 1, error = %e, "Unreadable alarm row"))
                    .ok()
            })
            .collect())
    }

    /// Remove alarm `id` and cancel its pending firing
    pub async fn delete_alarm(&self, id: usize) -> Result<()> {
        let mut scheduler = self.scheduler.lock().await;
        self.sync_alarms(&mut scheduler, now_timestamp())?;
        if id == 0 || id > scheduler.len() {
            return Err(PulseError::NotFound(format!("alarm #{id}")));
        }

        self.store.delete_at(&Stream::Alarms, id)?;
        scheduler.remove(id)?;
        info!(id, "Alarm deleted");
        Ok(())
    }

    /// Pop due alarms and start one delivery task per alarm in `deliveries`.
    ///
    /// Returns the number of alarms fired. If the alarm file cannot be read the
    /// tick is skipped, since a deleted alarm must not fire.
    pub async fn fire_due(
        &self,
        now: NaiveDateTime,
        sink: &Arc<dyn ReportSink>,
        deliveries: &mut JoinSet<()>,
    ) -> usize {
        let fired: Vec<FiredAlarm> = {
            let mut scheduler = self.scheduler.lock().await;
            if let Err(e) = self.sync_alarms(&mut scheduler, now) {
                error!(error = %e, "Alarm file unreadable, skipping tick");
                return 0;
            }
            scheduler.due(now)
        };

        let count = fired.len();
        for alarm in fired {
            info!(id = alarm.id, fire_at = %alarm.fire_at, "Alarm fired");
            let service = self.clone();
            let sink = Arc::clone(sink);
            deliveries.spawn(async move {
                service.deliver(&alarm.commands, sink.as_ref()).await;
            });
        }
        count
    }

    // ------------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------------

    fn streams(&self, target: PruneTarget) -> Result<Vec<Stream>> {
        Ok(match target {
            PruneTarget::All => {
                let mut streams = vec![Stream::Ap, Stream::Io];
                streams.extend(self.store.price_streams()?);
                streams.push(Stream::Alarms);
                streams
            }
            PruneTarget::Ap => vec![Stream::Ap],
            PruneTarget::Io => vec![Stream::Io],
            PruneTarget::Prices => self.store.price_streams()?,
            PruneTarget::Alarms => vec![Stream::Alarms],
        })
    }

    fn prune_streams(
        &self,
        streams: &[Stream],
        policy: RetentionPolicy,
        now: NaiveDateTime,
    ) -> Result<PruneReport> {
        let mut total = PruneReport::default();
        for stream in streams {
            let report = self.store.prune(stream, policy, now)?;
            total.removed += report.removed;
            total.kept += report.kept;
        }
        Ok(total)
    }

    /// Wipe the data rows of `target`, keeping headers
    pub async fn prune_history(&self, target: PruneTarget) -> Result<PruneReport> {
        let streams = self.streams(target)?;
        let wipes_alarms = streams.contains(&Stream::Alarms);

        // the alarm stream and the schedule change together
        let mut scheduler = if wipes_alarms {
            Some(self.scheduler.lock().await)
        } else {
            None
        };

        let report = self.prune_streams(&streams, RetentionPolicy::wipe(), now_timestamp())?;

        if let Some(scheduler) = scheduler.as_mut() {
            self.sync_alarms(scheduler, now_timestamp())?;
        }

        info!(target = %target, removed = report.removed, "History cleared");
        Ok(report)
    }

    /// Apply the configured retention to the indicator streams
    pub fn apply_retention(&self, now: NaiveDateTime) -> Result<PruneReport> {
        let mut streams = vec![Stream::Ap, Stream::Io];
        streams.extend(self.store.price_streams()?);

        let report = self.prune_streams(&streams, self.config.retention, now)?;
        info!(removed = report.removed, kept = report.kept, "Retention applied");
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Background loop
    // ------------------------------------------------------------------

    /// Tick the alarm schedule and the retention job until `shutdown` flips to true.
    ///
    /// Alarm deliveries still running at shutdown are awaited before returning.
    pub async fn run(&self, sink: Arc<dyn ReportSink>, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.config.scheduler_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let prune_every = self.config.prune_interval;
        let mut prune = tokio::time::interval_at(Instant::now() + prune_every, prune_every);
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            tick_secs = self.config.scheduler_tick.as_secs(),
            prune_secs = prune_every.as_secs(),
            "Alarm loop started"
        );

        let mut deliveries = JoinSet::new();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let fired = self.fire_due(now_timestamp(), &sink, &mut deliveries).await;
                    if fired > 0 {
                        debug!(alarms = fired, "Alarm deliveries started");
                    }
                }
                Some(done) = deliveries.join_next(), if !deliveries.is_empty() => {
                    if let Err(e) = done {
                        error!(error = %e, "Alarm delivery task failed");
                    }
                }
                _ = prune.tick() => {
                    if let Err(e) = self.apply_retention(now_timestamp()) {
                        error!(error = %e, "Retention failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if !deliveries.is_empty() {
            info!(pending = deliveries.len(), "Waiting for alarm deliveries");
        }
        while let Some(done) = deliveries.join_next().await {
            if let Err(e) = done {
                error!(error = %e, "Alarm delivery task failed");
            }
        }
        info!("Alarm loop stopped");
    }

    /// Spawn [`Self::run`] on the runtime
    pub fn spawn(
        &self,
        sink: Arc<dyn ReportSink>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move { service.run(sink, shutdown).await })
    }
}
