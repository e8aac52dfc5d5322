//! Market data types for the FMP price endpoints.

use crate::domain::model::{Record, Table};
use crate::utils::error::{EtlError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Bar interval accepted by `historical_price_by_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    FourHour,
    OneHour,
    ThirtyMin,
    FifteenMin,
    FiveMin,
    OneMin,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Interval {
    pub const ALL: [Interval; 11] = [
        Interval::FourHour,
        Interval::OneHour,
        Interval::ThirtyMin,
        Interval::FifteenMin,
        Interval::FiveMin,
        Interval::OneMin,
        Interval::Daily,
        Interval::Weekly,
        Interval::Monthly,
        Interval::Quarterly,
        Interval::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::FourHour => "4hour",
            Interval::OneHour => "1hour",
            Interval::ThirtyMin => "30min",
            Interval::FifteenMin => "15min",
            Interval::FiveMin => "5min",
            Interval::OneMin => "1min",
            Interval::Daily => "1d",
            Interval::Weekly => "1w",
            Interval::Monthly => "1m",
            Interval::Quarterly => "1q",
            Interval::Yearly => "1y",
        }
    }

    /// Intraday intervals are served by the `historical-chart` endpoint.
    pub fn is_intraday(&self) -> bool {
        self.frequency().is_none()
    }

    /// Resampling frequency for daily-derived intervals, `None` for intraday.
    pub fn frequency(&self) -> Option<Frequency> {
        match self {
            Interval::Daily => Some(Frequency::Daily),
            Interval::Weekly => Some(Frequency::Weekly),
            Interval::Monthly => Some(Frequency::Monthly),
            Interval::Quarterly => Some(Frequency::Quarterly),
            Interval::Yearly => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

impl FromStr for Interval {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        Interval::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| EtlError::UnsupportedInterval {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Period used to reduce returns in `get_multiple_returns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    pub fn code(&self) -> &'static str {
        match self {
            Period::Daily => "D",
            Period::Weekly => "W",
            Period::Monthly => "M",
            Period::Quarterly => "Q",
            Period::Yearly => "Y",
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Period::Daily => Frequency::Daily,
            Period::Weekly => Frequency::Weekly,
            Period::Monthly => Frequency::Monthly,
            Period::Quarterly => Frequency::Quarterly,
            Period::Yearly => Frequency::Yearly,
        }
    }
}

impl FromStr for Period {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "D" => Ok(Period::Daily),
            "W" => Ok(Period::Weekly),
            "M" => Ok(Period::Monthly),
            "Q" => Ok(Period::Quarterly),
            "Y" | "A" => Ok(Period::Yearly),
            _ => Err(EtlError::UnsupportedPeriod {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Calendar bucket a date is grouped into when resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// Column holding the bucket in a resampled price table.
    pub fn column_name(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "week",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarter",
            Frequency::Yearly => "year",
        }
    }
}

/// One row of `historical-price-full`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub adj_close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub unadjusted_volume: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub vwap: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub change_over_time: Option<f64>,
}

/// Envelope returned by `historical-price-full/{ticker}`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalResponse {
    pub symbol: String,
    #[serde(default)]
    pub historical: Vec<PriceBar>,
}

/// One row of `historical-chart/{interval}/{ticker}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntradayBar {
    #[serde(deserialize_with = "deserialize_fmp_datetime")]
    pub date: NaiveDateTime,
    pub open: f64,
    pub low: f64,
    pub high: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

const FMP_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FMP_DATE_FORMAT: &str = "%Y-%m-%d";

fn deserialize_fmp_datetime<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_fmp_datetime(&raw).map_err(serde::de::Error::custom)
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, ISO `T` separated, or a bare date (midnight).
pub fn parse_fmp_datetime(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, FMP_DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, FMP_DATE_FORMAT)
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| format!("invalid FMP date '{}': {}", raw, e))
}

/// A price row as handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRow {
    pub date: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub unadjusted_volume: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub vwap: Option<f64>,
    pub label: Option<String>,
    pub change_over_time: Option<f64>,
    /// Percent change of adjusted close against the previous daily row.
    pub pct_change: Option<f64>,
    /// Start of the resampling bucket this row represents.
    pub bucket: Option<NaiveDate>,
}

impl PriceRow {
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }
}

impl From<PriceBar> for PriceRow {
    fn from(bar: PriceBar) -> Self {
        Self {
            date: bar.date.and_time(chrono::NaiveTime::MIN),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close: bar.adj_close,
            volume: bar.volume,
            unadjusted_volume: bar.unadjusted_volume,
            change: bar.change,
            change_percent: bar.change_percent,
            vwap: bar.vwap,
            label: bar.label,
            change_over_time: bar.change_over_time,
            pct_change: None,
            bucket: None,
        }
    }
}

impl From<IntradayBar> for PriceRow {
    fn from(bar: IntradayBar) -> Self {
        Self {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close: None,
            volume: bar.volume,
            unadjusted_volume: None,
            change: None,
            change_percent: None,
            vwap: None,
            label: None,
            change_over_time: None,
            pct_change: None,
            bucket: None,
        }
    }
}

/// Price history of one ticker at one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub interval: Interval,
    pub rows: Vec<PriceRow>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> Vec<&'static str> {
        match self.interval.frequency() {
            None => vec!["date", "open", "low", "high", "close", "volume"],
            Some(freq) => {
                let mut columns = vec![
                    "date",
                    "symbol",
                    "open",
                    "high",
                    "low",
                    "close",
                    "adjClose",
                    "volume",
                    "unadjustedVolume",
                    "change",
                    "changePercent",
                    "vwap",
                    "label",
                    "changeOverTime",
                    "pct change",
                ];
                if freq != Frequency::Daily {
                    columns.push("daily");
                    columns.push(freq.column_name());
                }
                columns
            }
        }
    }

    pub fn to_table(&self) -> Table {
        let columns: Vec<String> = self.columns().into_iter().map(String::from).collect();
        let mut table = Table::new(columns);

        for row in &self.rows {
            let record = match self.interval.frequency() {
                None => Record::new()
                    .with(
                        "date",
                        Value::from(row.date.format(FMP_DATETIME_FORMAT).to_string()),
                    )
                    .with("open", Value::from(row.open))
                    .with("low", Value::from(row.low))
                    .with("high", Value::from(row.high))
                    .with("close", Value::from(row.close))
                    .with("volume", volume_value(row.volume)),
                Some(freq) => {
                    let mut record = Record::new()
                        .with(
                            "date",
                            Value::from(row.date.format(FMP_DATE_FORMAT).to_string()),
                        )
                        .with("symbol", Value::from(self.symbol.clone()))
                        .with("open", Value::from(row.open))
                        .with("high", Value::from(row.high))
                        .with("low", Value::from(row.low))
                        .with("close", Value::from(row.close))
                        .with("adjClose", optional_number(row.adj_close))
                        .with("volume", volume_value(row.volume))
                        .with("unadjustedVolume", volume_value(row.unadjusted_volume))
                        .with("change", optional_number(row.change))
                        .with("changePercent", optional_number(row.change_percent))
                        .with("vwap", optional_number(row.vwap))
                        .with(
                            "label",
                            row.label.clone().map(Value::from).unwrap_or(Value::Null),
                        )
                        .with("changeOverTime", optional_number(row.change_over_time))
                        .with("pct change", optional_number(row.pct_change));
                    if freq != Frequency::Daily {
                        record = record
                            .with("daily", Value::from(row.day().format(FMP_DATE_FORMAT).to_string()))
                            .with(
                                freq.column_name(),
                                row.bucket
                                    .map(|b| Value::from(bucket_cell(b, freq)))
                                    .unwrap_or(Value::Null),
                            );
                    }
                    record
                }
            };
            table.push(record);
        }

        table
    }
}

fn bucket_cell(bucket: NaiveDate, freq: Frequency) -> String {
    use chrono::Datelike;
    match freq {
        Frequency::Daily | Frequency::Weekly | Frequency::Monthly => {
            bucket.format(FMP_DATE_FORMAT).to_string()
        }
        Frequency::Quarterly => format!("{}Q{}", bucket.year(), bucket.month0() / 3 + 1),
        Frequency::Yearly => bucket.year().to_string(),
    }
}

fn optional_number(value: Option<f64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

// 成交量是整數，避免輸出成 1234.0
fn volume_value(value: Option<f64>) -> Value {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Value::from(v as i64),
        other => optional_number(other),
    }
}

/// Period returns of several tickers, outer-joined on the period.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsTable {
    pub period: Period,
    /// Bucket start of each row, ascending.
    pub periods: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    /// `values[row][column]`
    pub values: Vec<Vec<Option<f64>>>,
}

impl ReturnsTable {
    /// Outer join of per-ticker `(bucket, return)` columns.
    pub fn outer_join(period: Period, columns: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Self {
        let mut periods: Vec<NaiveDate> = columns
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(date, _)| *date))
            .collect();
        periods.sort();
        periods.dedup();

        let mut values = vec![vec![None; columns.len()]; periods.len()];
        for (col, (_, points)) in columns.iter().enumerate() {
            for (date, value) in points {
                if let Ok(row) = periods.binary_search(date) {
                    values[row][col] = Some(*value);
                }
            }
        }

        Self {
            period,
            periods,
            tickers: columns.into_iter().map(|(ticker, _)| ticker).collect(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn column(&self, ticker: &str) -> Option<Vec<Option<f64>>> {
        let col = self.tickers.iter().position(|t| t == ticker)?;
        Some(self.values.iter().map(|row| row[col]).collect())
    }

    pub fn get(&self, period_start: NaiveDate, ticker: &str) -> Option<f64> {
        let col = self.tickers.iter().position(|t| t == ticker)?;
        let row = self.periods.binary_search(&period_start).ok()?;
        self.values[row][col]
    }

    /// Divides every column by the index column of the same period.
    pub fn relative_to(&self, index: &str) -> Result<ReturnsTable> {
        let index_col = self
            .tickers
            .iter()
            .position(|t| t == index)
            .ok_or_else(|| EtlError::ProcessingError {
                message: format!("index '{}' is not a column of the returns table", index),
            })?;

        let values = self
            .values
            .iter()
            .map(|row| {
                let base = row[index_col].filter(|b| *b != 0.0);
                row.iter()
                    .map(|value| match (value, base) {
                        (Some(v), Some(b)) => Some(v / b),
                        _ => None,
                    })
                    .collect()
            })
            .collect();

        Ok(ReturnsTable {
            period: self.period,
            periods: self.periods.clone(),
            tickers: self.tickers.clone(),
            values,
        })
    }

    pub fn to_table(&self) -> Table {
        let mut columns = vec!["date".to_string()];
        columns.extend(self.tickers.iter().cloned());
        let mut table = Table::new(columns);

        for (row, period_start) in self.periods.iter().enumerate() {
            let mut record = Record::new().with(
                "date",
                Value::from(period_label(*period_start, self.period.frequency())),
            );
            for (col, ticker) in self.tickers.iter().enumerate() {
                record = record.with(ticker, optional_number(self.values[row][col]));
            }
            table.push(record);
        }

        table
    }
}

/// Period-style label of a bucket: `2023-01-03`, `2023-01-02/2023-01-08`,
/// `2023-01`, `2023Q1`, `2023`.
pub fn period_label(bucket: NaiveDate, freq: Frequency) -> String {
    match freq {
        Frequency::Daily => bucket.format(FMP_DATE_FORMAT).to_string(),
        Frequency::Weekly => {
            let end = bucket + chrono::Duration::days(6);
            format!(
                "{}/{}",
                bucket.format(FMP_DATE_FORMAT),
                end.format(FMP_DATE_FORMAT)
            )
        }
        Frequency::Monthly => bucket.format("%Y-%m").to_string(),
        Frequency::Quarterly | Frequency::Yearly => bucket_cell(bucket, freq),
    }
}
