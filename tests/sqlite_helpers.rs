#![allow(dead_code)]

use anyhow::{Context, Result};
use b3futures::db::{self, ContractRow, ScrapeStamp, SettlementRecord};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const FIXTURE_PAGE: &str = "tests/fixtures/ajustes.html";

pub fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("data").join("b3_futures.db")
}

pub fn fixture_html() -> String {
    std::fs::read_to_string(FIXTURE_PAGE).expect("fixture page")
}

pub fn at(date: &str, time: &str) -> NaiveDateTime {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("date");
    let time = chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").expect("time");
    date.and_time(time)
}

pub fn stamp(date: &str, time: &str) -> ScrapeStamp {
    ScrapeStamp::from_datetime(at(date, time))
}

pub fn contract(commodity: &str, month: &str, price: &str) -> ContractRow {
    ContractRow {
        commodity: commodity.to_string(),
        contract_month: month.to_string(),
        previous_price: price.to_string(),
        current_price: price.to_string(),
        variation: "0.00".to_string(),
        settlement_value: "0.00".to_string(),
    }
}

/// Append one batch of rows stamped `date time` directly through the store API
pub fn append_batch(path: &Path, date: &str, time: &str, rows: Vec<ContractRow>) -> Result<usize> {
    let stamp = stamp(date, time);
    let records: Vec<SettlementRecord> = rows
        .into_iter()
        .map(|row| SettlementRecord::from_row(row, &stamp))
        .collect();
    let mut conn = db::open_db(path)?;
    db::init_database(&conn)?;
    db::insert_batch(&mut conn, &records)
}

pub fn count_rows(path: &Path) -> Result<i64> {
    let conn = Connection::open(path).context("failed to open test database")?;
    let count = conn.query_row("SELECT COUNT(*) FROM all_futures", [], |row| row.get(0))?;
    Ok(count)
}

pub fn distinct_stamps(path: &Path) -> Result<Vec<(String, String)>> {
    let conn = Connection::open(path).context("failed to open test database")?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT download_date, download_time FROM all_futures
         ORDER BY download_date, download_time",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}
