//! Plain-text rendering of reports

use super::{ApReport, IoReport, PriceReport};
use crate::alarms::AlarmDefinition;
use crate::alarms::encode_commands;
use crate::error::PulseError;
use crate::indicators::{BucketScore, IntervalScore, MomentumSignal, NetFlow};
use crate::market::Symbol;

const MISSING: &str = "❌ no data";

/// Signed change against a previous value: `+3.20 🟢`, `-1.10 🔴` or `0.00 ⚪`
pub fn delta(current: f64, previous: f64) -> String {
    let diff = current - previous;
    if diff >= 0.005 {
        format!("{diff:+.2} 🟢")
    } else if diff <= -0.005 {
        format!("{diff:+.2} 🔴")
    } else {
        "0.00 ⚪".to_string()
    }
}

fn millions(volume: f64) -> String {
    format!("{:.2}M", volume / 1_000_000.0)
}

/// Renders engine output for chat
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    settlement: String,
}

impl ReportFormatter {
    pub fn new(settlement: impl Into<String>) -> Self {
        Self {
            settlement: settlement.into(),
        }
    }

    fn name<'a>(&self, symbol: &'a Symbol) -> &'a str {
        symbol.display_name(&self.settlement)
    }

    pub fn format_ap(&self, report: &ApReport) -> String {
        let previous = report.previous.as_ref();
        let line = |label: &str, bucket: &BucketScore, prev: Option<f64>| {
            if bucket.is_missing() {
                return format!("{label}: {MISSING}");
            }
            match prev {
                Some(p) => format!("{label}: {:.2} ({})", bucket.score, delta(bucket.score, p)),
                None => format!("{label}: {:.2}", bucket.score),
            }
        };

        let scores = &report.scores;
        [
            "📊 AP Report".to_string(),
            line("BTC strength", &scores.btc, previous.map(|p| p.btc_strength)),
            line(
                &format!("{} strength", self.settlement),
                &scores.usdt,
                previous.map(|p| p.usdt_strength),
            ),
            line(
                "Long-term strength",
                &scores.long_term,
                previous.map(|p| p.long_term_strength),
            ),
        ]
        .join("\n")
    }

    fn interval_scores(scores: &[IntervalScore]) -> String {
        scores
            .iter()
            .map(|s| match s.score {
                Some(score) => format!("{} {score:.2}", s.interval),
                None => format!("{} ❌", s.interval),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    pub fn format_io(&self, reports: &[IoReport]) -> String {
        let mut out = String::from("📊 IO Report");
        for report in reports {
            out.push_str(&format!(
                "\n{}: {}",
                self.name(&report.symbol),
                Self::interval_scores(&report.scores)
            ));
            match &report.ticker {
                Some(t) => out.push_str(&format!(
                    "\n  24h: {:.2}% | H:{:.2} | L:{:.2} | V:{}",
                    t.price_change_percent,
                    t.high_price,
                    t.low_price,
                    millions(t.quote_volume)
                )),
                None => out.push_str(&format!("\n  24h: {MISSING}")),
            }
        }
        out
    }

    pub fn format_mts(&self, symbol: &Symbol, signal: &MomentumSignal) -> String {
        let mut out = format!(
            "📈 MTS {}: {:.1} ({})",
            self.name(symbol),
            signal.ratio,
            Self::interval_scores(&[signal.short, signal.long])
        );
        if let Some(price) = signal.price {
            out.push_str(&format!("\nPrice: {price:.2}$"));
        }
        if signal.is_degraded() {
            out.push_str("\n⚠️ partial data");
        }
        out
    }

    pub fn format_npr(&self, flows: &[NetFlow], basket: usize) -> String {
        let mut out = format!("🌊 NPR Report ({basket} symbols)");
        for flow in flows {
            if flow.contributors == 0 {
                out.push_str(&format!("\n{}: {:.2} {MISSING}", flow.interval, flow.score));
            } else {
                out.push_str(&format!(
                    "\n{}: {:.2} ({}/{basket})",
                    flow.interval, flow.score, flow.contributors
                ));
            }
        }
        out
    }

    pub fn format_prices(&self, report: &PriceReport) -> String {
        let mut out = format!("💰 Prices: {}", report.list);
        for row in &report.rows {
            let name = self.name(&row.symbol);
            let Some(t) = &row.ticker else {
                out.push_str(&format!("\n{name}: {MISSING}"));
                continue;
            };
            out.push_str(&format!(
                "\n{name}: {:.2}$ | {:+.2}% | Vol:{}",
                t.last_price,
                t.price_change_percent,
                millions(t.quote_volume)
            ));
            if let Some(prev) = row.previous_price {
                out.push_str(&format!(" ({})", delta(t.last_price, prev)));
            }
        }
        out
    }

    pub fn format_alarms(&self, alarms: &[AlarmDefinition]) -> String {
        if alarms.is_empty() {
            return "⏰ No alarms".to_string();
        }
        let mut out = String::from("⏰ Alarms");
        for alarm in alarms {
            out.push_str(&format!(
                "\n{}. {} → {} ({})",
                alarm.id,
                alarm.fire_spec,
                encode_commands(&alarm.commands),
                if alarm.recurring { "recurring" } else { "once" }
            ));
        }
        out
    }

    pub fn format_error(&self, error: &PulseError) -> String {
        if error.is_validation() {
            format!("⚠️ {error}")
        } else {
            format!("❌ {error}")
        }
    }
}
