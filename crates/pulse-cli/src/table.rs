//! Table rendering for listings

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Table};
use market_pulse::AlarmDefinition;
use market_pulse::alarms::encode_commands;
use market_pulse::report::PriceReport;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn number(value: String) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

pub fn alarms(alarms: &[AlarmDefinition]) -> Table {
    let mut table = table(&["ID", "Fires", "Commands", "Kind", "Created"]);
    for alarm in alarms {
        table.add_row(vec![
            number(alarm.id.to_string()),
            Cell::new(alarm.fire_spec.to_string()),
            Cell::new(encode_commands(&alarm.commands)),
            Cell::new(if alarm.recurring { "daily" } else { "once" }),
            Cell::new(alarm.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }
    table
}

pub fn prices(report: &PriceReport, settlement: &str) -> Table {
    let mut table = table(&["Symbol", "Price", "24h %", "Volume (M)", "Δ last"]);
    for row in &report.rows {
        let name = row.symbol.display_name(settlement);
        match &row.ticker {
            Some(t) => table.add_row(vec![
                Cell::new(name),
                number(format!("{:.2}", t.last_price)),
                number(format!("{:+.2}", t.price_change_percent)),
                number(format!("{:.2}", t.quote_volume / 1_000_000.0)),
                number(
                    row.previous_price
                        .map(|p| format!("{:+.2}", t.last_price - p))
                        .unwrap_or_default(),
                ),
            ]),
            None => table.add_row(vec![Cell::new(name), Cell::new("no data")]),
        };
    }
    table
}
