use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Column names of the `all_futures` table, in storage order
pub const COLUMNS: [&str; 8] = [
    "Commodity",
    "Contract_Month",
    "Previous_Price",
    "Current_Price",
    "Variation",
    "Settlement_Value",
    "download_date",
    "download_time",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// One contract line as published on the settlement page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractRow {
    pub commodity: String,
    pub contract_month: String,
    pub previous_price: String,
    pub current_price: String,
    pub variation: String,
    pub settlement_value: String,
}

/// Date and time shared by every row of a single collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScrapeStamp {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl ScrapeStamp {
    /// Truncates sub-second precision so the stored time matches `HH:MM:SS`
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let time = dt.time().with_nanosecond(0).unwrap_or_else(|| dt.time());
        Self {
            date: dt.date(),
            time,
        }
    }

    pub fn date_str(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn time_str(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }
}

impl std::fmt::Display for ScrapeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date_str(), self.time_str())
    }
}

/// A stored row of `all_futures`: one contract in one scrape batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "Contract_Month")]
    pub contract_month: String,
    #[serde(rename = "Previous_Price")]
    pub previous_price: String,
    #[serde(rename = "Current_Price")]
    pub current_price: String,
    #[serde(rename = "Variation")]
    pub variation: String,
    #[serde(rename = "Settlement_Value")]
    pub settlement_value: String,
    pub download_date: String,
    pub download_time: String,
}

impl SettlementRecord {
    pub fn from_row(row: ContractRow, stamp: &ScrapeStamp) -> Self {
        Self {
            commodity: row.commodity,
            contract_month: row.contract_month,
            previous_price: row.previous_price,
            current_price: row.current_price,
            variation: row.variation,
            settlement_value: row.settlement_value,
            download_date: stamp.date_str(),
            download_time: stamp.time_str(),
        }
    }

    /// Field values in `COLUMNS` order
    pub fn values(&self) -> [&str; 8] {
        [
            self.commodity.as_str(),
            self.contract_month.as_str(),
            self.previous_price.as_str(),
            self.current_price.as_str(),
            self.variation.as_str(),
            self.settlement_value.as_str(),
            self.download_date.as_str(),
            self.download_time.as_str(),
        ]
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.download_date, DATE_FORMAT).ok()
    }

    pub fn datetime(&self) -> Option<NaiveDateTime> {
        let time = NaiveTime::parse_from_str(&self.download_time, TIME_FORMAT).ok()?;
        Some(self.date()?.and_time(time))
    }

    /// "DI1 - 1-day Interbank Deposits J27"
    pub fn contract_label(&self) -> String {
        format!("{} {}", self.commodity, self.contract_month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_formats_and_drops_subseconds() {
        let dt = NaiveDate::from_ymd_opt(2025, 10, 10)
            .unwrap()
            .and_hms_milli_opt(23, 0, 5, 750)
            .unwrap();
        let stamp = ScrapeStamp::from_datetime(dt);
        assert_eq!(stamp.date_str(), "2025-10-10");
        assert_eq!(stamp.time_str(), "23:00:05");
        assert_eq!(stamp.to_string(), "2025-10-10 23:00:05");
    }

    #[test]
    fn test_record_from_row_keeps_blank_fields() {
        let stamp = ScrapeStamp::from_datetime(
            NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
        );
        let row = ContractRow {
            commodity: "BGI - Live Cattle".into(),
            contract_month: "V25".into(),
            previous_price: "".into(),
            current_price: "310.00".into(),
            variation: "".into(),
            settlement_value: "".into(),
        };
        let record = SettlementRecord::from_row(row, &stamp);
        assert_eq!(record.values().len(), COLUMNS.len());
        assert_eq!(record.previous_price, "");
        assert_eq!(record.download_time, "08:30:00");
        assert_eq!(record.contract_label(), "BGI - Live Cattle V25");
        assert_eq!(
            record.datetime().unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_record_serializes_with_column_names() {
        let record = SettlementRecord {
            commodity: "DOL".into(),
            contract_month: "X25".into(),
            previous_price: "1".into(),
            current_price: "2".into(),
            variation: "1".into(),
            settlement_value: "50".into(),
            download_date: "2025-10-10".into(),
            download_time: "23:00:00".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        for column in COLUMNS {
            assert!(json.get(column).is_some(), "missing {}", column);
        }
    }
}
