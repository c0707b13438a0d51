//! Derived series for the charts: contract maturities and realized volatility.

use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::db::SettlementRecord;
use crate::utils::published_number_f64;

/// Trading days per year used to annualize daily volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

static CONTRACT_CODE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^([FGHJKMNQUVXZ])(\d{2}|\d{4})$").ok());

/// Month number for a futures month letter (F = Jan ... Z = Dec)
pub fn month_from_code(code: char) -> Option<u32> {
    let month = match code.to_ascii_uppercase() {
        'F' => 1,
        'G' => 2,
        'H' => 3,
        'J' => 4,
        'K' => 5,
        'M' => 6,
        'N' => 7,
        'Q' => 8,
        'U' => 9,
        'V' => 10,
        'X' => 11,
        'Z' => 12,
        _ => return None,
    };
    Some(month)
}

/// Approximate maturity of a contract month code such as `J27`.
///
/// The exchange calendar is not modelled; the 15th of the month stands in for
/// the actual expiration day.
pub fn parse_contract_month(code: &str) -> Option<NaiveDate> {
    let code = code.trim().to_ascii_uppercase();
    let caps = CONTRACT_CODE.as_ref()?.captures(&code)?;
    let month = month_from_code(caps.get(1)?.as_str().chars().next()?)?;
    let year_digits = caps.get(2)?.as_str();
    let year: i32 = year_digits.parse().ok()?;
    let year = if year_digits.len() == 2 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(year, month, 15)
}

/// Calendar days from `on` to the contract's approximate maturity
pub fn days_to_maturity(contract_month: &str, on: NaiveDate) -> Option<i64> {
    parse_contract_month(contract_month).map(|maturity| (maturity - on).num_days())
}

/// Sort key that orders contract months by maturity, unknown codes last
pub fn maturity_sort_key(contract_month: &str) -> (i32, u32, String) {
    match parse_contract_month(contract_month) {
        Some(date) => (date.year(), date.month(), contract_month.to_string()),
        None => (i32::MAX, u32::MAX, contract_month.to_string()),
    }
}

/// Annualized rolling volatility of a price series.
///
/// Entry `i` is `None` until `window` daily returns are available; after that
/// it is the sample standard deviation of the last `window` returns times
/// sqrt(252).
pub fn historical_volatility(prices: &[f64], window: usize) -> Vec<Option<f64>> {
    let returns: Vec<Option<f64>> = std::iter::once(None)
        .chain(prices.windows(2).map(|pair| {
            (pair[0] != 0.0).then(|| pair[1] / pair[0] - 1.0)
        }))
        .collect();

    (0..prices.len())
        .map(|i| {
            if window < 2 || i < window {
                return None;
            }
            let slice = &returns[i + 1 - window..=i];
            let values: Vec<f64> = slice.iter().flatten().copied().collect();
            if values.len() < window {
                return None;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance = values.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
                / (values.len() as f64 - 1.0);
            Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
        })
        .collect()
}

/// Current-price series per contract label, ordered by scrape datetime.
///
/// Same-day re-runs collapse to the last observation of the day.
pub fn daily_price_series(records: &[SettlementRecord]) -> BTreeMap<String, Vec<(NaiveDate, f64)>> {
    let mut series: BTreeMap<String, BTreeMap<NaiveDate, (String, f64)>> = BTreeMap::new();
    for record in records {
        let (Some(date), Some(price)) = (record.date(), published_number_f64(&record.current_price))
        else {
            continue;
        };
        let per_day = series.entry(record.contract_label()).or_default();
        let replace = per_day
            .get(&date)
            .map_or(true, |(time, _)| record.download_time >= *time);
        if replace {
            per_day.insert(date, (record.download_time.clone(), price));
        }
    }

    series
        .into_iter()
        .map(|(label, days)| {
            let points = days.into_iter().map(|(d, (_, p))| (d, p)).collect_vec();
            (label, points)
        })
        .collect()
}
