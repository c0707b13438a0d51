//! Settlement collection: fetch → parse → stamp → append.
//!
//! A run either appends its full batch or leaves the store untouched. The
//! store is only opened after the page has been fetched and parsed, and the
//! append itself is a single transaction.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use itertools::Itertools;
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::db::{self, ContractRow, ScrapeStamp, SettlementRecord};
use crate::scraping::{parse_settlement_page, SettlementFetcher};

/// Outcome of one collection run
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub rows_written: usize,
    pub download_date: String,
    pub download_time: String,
    /// (commodity, contracts) in page order
    pub commodities: Vec<(String, usize)>,
    pub db_path: Option<PathBuf>,
    pub dry_run: bool,
}

/// Stamp every parsed row with the run's shared date and time
pub fn stamp_rows(rows: Vec<ContractRow>, stamp: &ScrapeStamp) -> Vec<SettlementRecord> {
    rows.into_iter()
        .map(|row| SettlementRecord::from_row(row, stamp))
        .collect()
}

/// Parse a page and append it to an open store
pub fn collect_from_html(
    conn: &mut Connection,
    html: &str,
    stamp: &ScrapeStamp,
) -> Result<CollectionReport> {
    let rows = parse_settlement_page(html).context("Failed to parse settlement page")?;
    let records = stamp_rows(rows, stamp);

    db::init_database(conn)?;
    let written = db::insert_batch(conn, &records).context("Failed to append settlement batch")?;

    Ok(build_report(&records, written, stamp, None, false))
}

/// Full scheduled run: one GET against the configured source, then append.
///
/// `now` is the run's wall-clock time; all rows share it.
pub async fn collect(config: &Config, db_path: &Path, now: NaiveDateTime) -> Result<CollectionReport> {
    let stamp = ScrapeStamp::from_datetime(now);
    let fetcher = SettlementFetcher::new(config)?;
    let html = fetcher
        .fetch_page()
        .await
        .with_context(|| format!("Failed to download {}", fetcher.url()))?;

    collect_html_into(&html, db_path, &stamp)
}

/// Parse already-downloaded markup and append it to the store at `db_path`
pub fn collect_html_into(html: &str, db_path: &Path, stamp: &ScrapeStamp) -> Result<CollectionReport> {
    // Parse before touching the store so a markup failure never creates or locks it
    let rows = parse_settlement_page(html).context("Failed to parse settlement page")?;
    let records = stamp_rows(rows, stamp);

    let mut conn = db::open_db(db_path)?;
    db::init_database(&conn)?;
    let written = db::insert_batch(&mut conn, &records)
        .with_context(|| format!("Failed to append settlement batch to {:?}", db_path))?;

    info!(
        "Collected {} contracts stamped {} into {:?}",
        written, stamp, db_path
    );
    Ok(build_report(
        &records,
        written,
        stamp,
        Some(db_path.to_path_buf()),
        false,
    ))
}

/// Fetch and parse without writing anything
pub async fn preview(config: &Config, now: NaiveDateTime) -> Result<(Vec<SettlementRecord>, CollectionReport)> {
    let stamp = ScrapeStamp::from_datetime(now);
    let fetcher = SettlementFetcher::new(config)?;
    let html = fetcher
        .fetch_page()
        .await
        .with_context(|| format!("Failed to download {}", fetcher.url()))?;
    preview_html(&html, &stamp)
}

pub fn preview_html(html: &str, stamp: &ScrapeStamp) -> Result<(Vec<SettlementRecord>, CollectionReport)> {
    let rows = parse_settlement_page(html).context("Failed to parse settlement page")?;
    let records = stamp_rows(rows, stamp);
    let report = build_report(&records, 0, stamp, None, true);
    Ok((records, report))
}

fn build_report(
    records: &[SettlementRecord],
    written: usize,
    stamp: &ScrapeStamp,
    db_path: Option<PathBuf>,
    dry_run: bool,
) -> CollectionReport {
    let commodities = records
        .iter()
        .chunk_by(|r| r.commodity.clone())
        .into_iter()
        .map(|(commodity, group)| (commodity, group.count()))
        .collect();

    CollectionReport {
        rows_written: written,
        download_date: stamp.date_str(),
        download_time: stamp.time_str(),
        commodities,
        db_path,
        dry_run,
    }
}
