// Database module - SQLite connection, schema and the append path

pub mod models;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::FuturesError;
pub use models::{ContractRow, ScrapeStamp, SettlementRecord, COLUMNS};

pub const TABLE_NAME: &str = "all_futures";

/// Writers wait this long on a locked store before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Get the default database path (~/.b3futures/b3_futures.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".b3futures").join("b3_futures.db"))
}

/// Open (creating if absent) the store for writing
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory {:?}", parent))?;
    }

    let conn = Connection::open(path)
        .map_err(|e| FuturesError::Store(format!("cannot open {:?}: {}", path, e)))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;

    Ok(conn)
}

/// Open an existing store read-only. Never creates the file.
pub fn open_db_read_only(path: &Path) -> Result<Connection> {
    if !path.exists() {
        return Err(FuturesError::Query(format!("store not found at {:?}", path)).into());
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )
    .map_err(|e| FuturesError::Query(format!("cannot open {:?}: {}", path, e)))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;

    Ok(conn)
}

/// Ensure the `all_futures` table exists with the expected columns
pub fn init_database(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");

    conn.execute_batch(schema_sql)
        .map_err(|e| FuturesError::Store(format!("failed to apply schema: {}", e)))?;

    verify_schema(conn)?;
    debug!("Schema for {} verified", TABLE_NAME);
    Ok(())
}

/// Fail when `all_futures` lacks any of the eight archive columns
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", TABLE_NAME))?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    let missing: Vec<&str> = COLUMNS
        .iter()
        .copied()
        .filter(|col| !existing.iter().any(|e| e == col))
        .collect();

    if !missing.is_empty() {
        return Err(FuturesError::Store(format!(
            "schema mismatch: {} is missing column(s) {}",
            TABLE_NAME,
            missing.join(", ")
        ))
        .into());
    }

    Ok(())
}

/// Append a scrape batch in a single transaction.
///
/// Either every record is committed or none is: any failure drops the
/// transaction, which rolls it back.
pub fn insert_batch(conn: &mut Connection, records: &[SettlementRecord]) -> Result<usize> {
    let tx = conn
        .transaction()
        .map_err(|e| FuturesError::Store(format!("cannot begin transaction: {}", e)))?;

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO all_futures (
                Commodity, Contract_Month, Previous_Price, Current_Price,
                Variation, Settlement_Value, download_date, download_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for record in records {
            stmt.execute(params![
                record.commodity,
                record.contract_month,
                record.previous_price,
                record.current_price,
                record.variation,
                record.settlement_value,
                record.download_date,
                record.download_time,
            ])
            .map_err(|e| {
                FuturesError::Store(format!(
                    "insert failed for {}: {}",
                    record.contract_label(),
                    e
                ))
            })?;
        }
    }

    tx.commit()
        .map_err(|e| FuturesError::Store(format!("commit failed: {}", e)))?;

    info!("Appended {} rows to {}", records.len(), TABLE_NAME);
    Ok(records.len())
}

/// Total number of rows in the archive
pub fn count_rows(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM all_futures", [], |row| row.get(0))?;
    Ok(count)
}

/// Map a `SELECT <COLUMNS>` row into a record
pub fn record_from_row(row: &rusqlite::Row) -> Result<SettlementRecord, rusqlite::Error> {
    Ok(SettlementRecord {
        commodity: get_text_value(row, 0)?,
        contract_month: get_text_value(row, 1)?,
        previous_price: get_text_value(row, 2)?,
        current_price: get_text_value(row, 3)?,
        variation: get_text_value(row, 4)?,
        settlement_value: get_text_value(row, 5)?,
        download_date: get_text_value(row, 6)?,
        download_time: get_text_value(row, 7)?,
    })
}

/// Helper to read a published field as text (handles TEXT, INTEGER, REAL and NULL).
///
/// Stores written by other tools may hold numbers in these columns; NULL maps
/// to the empty marker.
pub fn get_text_value(row: &rusqlite::Row, idx: usize) -> Result<String, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))),
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Real(f) => Ok(f.to_string()),
        ValueRef::Null => Ok(String::new()),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "text".to_string(),
            rusqlite::types::Type::Blob,
        )),
    }
}
