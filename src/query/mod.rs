//! Read-only query layer over the settlement archive.
//!
//! [`FuturesStore`] wraps a read-only connection, so every helper here is
//! incapable of mutating the store; arbitrary SQL that tries to write fails
//! with SQLite's read-only error.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::db::{self, SettlementRecord, COLUMNS};
use crate::error::FuturesError;

pub const DEFAULT_HISTORY_DAYS: i64 = 30;

/// Optional inclusive bounds on `download_date`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }
}

/// One dynamically typed cell from an arbitrary query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Result of an arbitrary query: the statement's own projection, verbatim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryTable {
    pub fn from_records(records: &[SettlementRecord]) -> Self {
        Self {
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: records
                .iter()
                .map(|r| {
                    r.values()
                        .iter()
                        .map(|v| CellValue::Text(v.to_string()))
                        .collect()
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Distinct commodity with archive statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommoditySummary {
    pub commodity: String,
    pub rows: i64,
    pub contracts: i64,
    pub last_date: String,
}

/// One scrape batch in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub download_date: String,
    pub download_time: String,
    pub rows: i64,
}

/// Read-only handle on the settlement store
pub struct FuturesStore {
    conn: Connection,
}

impl FuturesStore {
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = db::open_db_read_only(path)?;
        info!("Opened store {:?} read-only", path);
        Ok(Self { conn })
    }

    /// Wrap an existing connection (tests, in-memory stores)
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn select_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SettlementRecord>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| FuturesError::Query(e.to_string()))?;
        let records = stmt
            .query_map(params, db::record_from_row)
            .map_err(|e| FuturesError::Query(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FuturesError::Query(e.to_string()))?;
        debug!("Query returned {} rows", records.len());
        Ok(records)
    }

    /// All rows of the most recent `download_date`
    pub fn latest_snapshot(&self) -> Result<Vec<SettlementRecord>> {
        let sql = format!(
            "SELECT {} FROM all_futures
             WHERE download_date = (SELECT MAX(download_date) FROM all_futures)
             ORDER BY Commodity, Contract_Month, download_time",
            COLUMNS.join(", ")
        );
        self.select_records(&sql, [])
    }

    /// The latest row per (Commodity, Contract_Month) within the most recent
    /// date, disambiguating same-day re-runs by `download_time`
    pub fn latest_per_contract(&self) -> Result<Vec<SettlementRecord>> {
        let sql = format!(
            "SELECT {cols} FROM (
                SELECT {cols}, ROW_NUMBER() OVER (
                    PARTITION BY Commodity, Contract_Month
                    ORDER BY download_time DESC, rowid DESC
                ) AS rn
                FROM all_futures
                WHERE download_date = (SELECT MAX(download_date) FROM all_futures)
             )
             WHERE rn = 1
             ORDER BY Commodity, Contract_Month",
            cols = COLUMNS.join(", ")
        );
        self.select_records(&sql, [])
    }

    /// Rows whose commodity contains `filter` (case-insensitive) within the
    /// last `days` calendar days before `as_of`
    pub fn commodity_history(
        &self,
        filter: &str,
        days: i64,
        as_of: NaiveDate,
    ) -> Result<Vec<SettlementRecord>> {
        if days < 0 {
            return Err(FuturesError::Query(format!("days must not be negative (got {})", days)).into());
        }
        let cutoff = Duration::try_days(days)
            .and_then(|span| as_of.checked_sub_signed(span))
            .ok_or_else(|| FuturesError::Query(format!("days out of range (got {})", days)))?;
        let sql = format!(
            "SELECT {} FROM all_futures
             WHERE instr(upper(Commodity), upper(?1)) > 0
               AND download_date >= ?2
               AND download_date <= ?3
             ORDER BY download_date, download_time, Contract_Month",
            COLUMNS.join(", ")
        );
        self.select_records(
            &sql,
            params![
                filter,
                cutoff.format(db::models::DATE_FORMAT).to_string(),
                as_of.format(db::models::DATE_FORMAT).to_string()
            ],
        )
    }

    /// Every row, newest batch first, optionally bounded by date
    pub fn full_extract(&self, range: DateRange) -> Result<Vec<SettlementRecord>> {
        let from = range
            .from
            .map(|d| d.format(db::models::DATE_FORMAT).to_string());
        let to = range.to.map(|d| d.format(db::models::DATE_FORMAT).to_string());
        let sql = format!(
            "SELECT {} FROM all_futures
             WHERE (?1 IS NULL OR download_date >= ?1)
               AND (?2 IS NULL OR download_date <= ?2)
             ORDER BY download_date DESC, download_time DESC, Commodity, Contract_Month",
            COLUMNS.join(", ")
        );
        self.select_records(&sql, params![from, to])
    }

    /// Run caller-supplied SQL as-is and return its result verbatim
    pub fn arbitrary(&self, sql: &str) -> Result<QueryTable> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| FuturesError::Query(format!("{} (in: {})", e, sql.trim())))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt
            .query([])
            .map_err(|e| FuturesError::Query(e.to_string()))?;
        while let Some(row) = cursor.next().map_err(|e| FuturesError::Query(e.to_string()))? {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| FuturesError::Query(e.to_string()))?;
                cells.push(CellValue::from_value_ref(value));
            }
            rows.push(cells);
        }

        info!("Arbitrary query returned {} rows", rows.len());
        Ok(QueryTable { columns, rows })
    }

    pub fn row_count(&self) -> Result<i64> {
        db::count_rows(&self.conn).map_err(|e| FuturesError::Query(e.to_string()).into())
    }

    /// Commodities in the archive with row counts and their last scrape date
    pub fn commodities(&self) -> Result<Vec<CommoditySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT Commodity, COUNT(*), COUNT(DISTINCT Contract_Month), MAX(download_date)
             FROM all_futures
             GROUP BY Commodity
             ORDER BY Commodity",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(CommoditySummary {
                    commodity: db::get_text_value(row, 0)?,
                    rows: row.get(1)?,
                    contracts: row.get(2)?,
                    last_date: db::get_text_value(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list commodities")?;
        Ok(items)
    }

    /// Scrape batches, newest first
    pub fn batches(&self) -> Result<Vec<BatchSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT download_date, download_time, COUNT(*)
             FROM all_futures
             GROUP BY download_date, download_time
             ORDER BY download_date DESC, download_time DESC",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(BatchSummary {
                    download_date: db::get_text_value(row, 0)?,
                    download_time: db::get_text_value(row, 1)?,
                    rows: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list batches")?;
        Ok(items)
    }
}
