//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data retrieval from presentation.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::Path;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::analysis::ChartSet;
use crate::collector::CollectionReport;
use crate::db::{SettlementRecord, COLUMNS};
use crate::query::{BatchSummary, CommoditySummary, QueryTable};
use crate::utils::parse_published_number;

/// Turn colour off for `--no-color` or when stdout is not a terminal
pub fn init_color(no_color: bool) {
    if no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn colored_variation(variation: &str) -> String {
    match parse_published_number(variation) {
        Some(v) if v.is_sign_negative() && !v.is_zero() => variation.red().to_string(),
        Some(v) if !v.is_zero() => variation.green().to_string(),
        _ => variation.to_string(),
    }
}

/// Settlement rows as a table
pub fn format_records_table(records: &[SettlementRecord]) -> String {
    #[derive(Tabled)]
    struct SettlementRow {
        #[tabled(rename = "Commodity")]
        commodity: String,
        #[tabled(rename = "Month")]
        contract_month: String,
        #[tabled(rename = "Previous")]
        previous_price: String,
        #[tabled(rename = "Current")]
        current_price: String,
        #[tabled(rename = "Variation")]
        variation: String,
        #[tabled(rename = "Settlement")]
        settlement_value: String,
        #[tabled(rename = "Date")]
        download_date: String,
        #[tabled(rename = "Time")]
        download_time: String,
    }

    let rows: Vec<SettlementRow> = records
        .iter()
        .map(|r| SettlementRow {
            commodity: r.commodity.clone(),
            contract_month: r.contract_month.clone(),
            previous_price: r.previous_price.clone(),
            current_price: r.current_price.clone(),
            variation: colored_variation(&r.variation),
            settlement_value: r.settlement_value.clone(),
            download_date: r.download_date.clone(),
            download_time: r.download_time.clone(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(2..6), Alignment::right());
    table.to_string()
}

/// Arbitrary query result with its own column names
pub fn format_query_table(result: &QueryTable) -> String {
    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in &result.rows {
        builder.push_record(row.iter().map(|cell| cell.to_string()));
    }
    builder.build().with(Style::rounded()).to_string()
}

pub fn format_commodities_table(items: &[CommoditySummary]) -> String {
    #[derive(Tabled)]
    struct CommodityRow {
        #[tabled(rename = "Commodity")]
        commodity: String,
        #[tabled(rename = "Contracts")]
        contracts: i64,
        #[tabled(rename = "Rows")]
        rows: i64,
        #[tabled(rename = "Last Date")]
        last_date: String,
    }

    let rows: Vec<CommodityRow> = items
        .iter()
        .map(|c| CommodityRow {
            commodity: c.commodity.clone(),
            contracts: c.contracts,
            rows: c.rows,
            last_date: c.last_date.clone(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(1..3), Alignment::right());
    table.to_string()
}

pub fn format_batches_table(items: &[BatchSummary]) -> String {
    #[derive(Tabled)]
    struct BatchRow {
        #[tabled(rename = "Date")]
        download_date: String,
        #[tabled(rename = "Time")]
        download_time: String,
        #[tabled(rename = "Rows")]
        rows: i64,
    }

    let rows: Vec<BatchRow> = items
        .iter()
        .map(|b| BatchRow {
            download_date: b.download_date.clone(),
            download_time: b.download_time.clone(),
            rows: b.rows,
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(2..), Alignment::right());
    table.to_string()
}

/// Summary lines for a collection run
pub fn format_collection_report(report: &CollectionReport) -> String {
    let mut output = String::new();
    let stamp = format!("{} {}", report.download_date, report.download_time);

    if report.dry_run {
        let total: usize = report.commodities.iter().map(|(_, n)| n).sum();
        output.push_str(&format!(
            "\n{} Parsed {} contracts stamped {}\n",
            "✓".green().bold(),
            total,
            stamp
        ));
    } else {
        output.push_str(&format!(
            "\n{} Appended {} rows stamped {}\n",
            "✓".green().bold(),
            report.rows_written,
            stamp
        ));
        if let Some(path) = &report.db_path {
            output.push_str(&format!("  Store: {}\n", path.display()));
        }
    }

    for (commodity, contracts) in &report.commodities {
        output.push_str(&format!("  {:<50} {:>4}\n", commodity, contracts));
    }

    if report.dry_run {
        output.push_str(&format!("\n{} Dry run - no changes saved\n", "ℹ".blue().bold()));
    }
    output
}

pub fn format_chart_set(set: &ChartSet) -> String {
    if set.is_empty() {
        return format!("\n{} No data to chart\n", "ℹ".blue().bold());
    }
    let mut output = format!(
        "\n{} Built {} charts: {}\n",
        "✓".green().bold(),
        set.figures.len(),
        set.names().join(", ")
    );
    for path in &set.written {
        output.push_str(&format!("  {}\n", path.display()));
    }
    output
}

pub fn format_empty(what: &str) -> String {
    format!("\n{} No {} found\n", "ℹ".blue().bold(), what)
}

/// Write settlement rows as CSV with the store's column names as header
pub fn write_records_csv<W: Write>(writer: W, records: &[SettlementRecord]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(COLUMNS)?;
    for record in records {
        csv_writer.write_record(record.values())?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_records_csv(path: &Path, records: &[SettlementRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    write_records_csv(file, records)
        .with_context(|| format!("Failed to write CSV file {}", path.display()))
}
