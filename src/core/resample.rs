//! Date bucketing and percent change over daily price rows.

use crate::domain::market::{Frequency, PriceRow};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashSet;

/// First calendar day of the bucket `date` falls in. Weeks start on Monday.
pub fn bucket_start(date: NaiveDate, freq: Frequency) -> NaiveDate {
    match freq {
        Frequency::Daily => date,
        Frequency::Weekly => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
        Frequency::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
        Frequency::Quarterly => {
            let first_month = date.month0() / 3 * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date)
        }
        Frequency::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

/// `current / prev - 1` over a forward-filled series.
///
/// A missing value takes the last present one, so a gap after a known price
/// is a `0.0` change. Values before the first present one and a zero `prev`
/// yield `None`.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut previous: Option<f64> = None;
    values
        .iter()
        .map(|value| {
            let current = value.or(previous);
            let change = match (current, previous) {
                (Some(current), Some(prev)) if prev != 0.0 => Some(current / prev - 1.0),
                _ => None,
            };
            previous = current;
            change
        })
        .collect()
}

/// Fills `pct_change` from the adjusted close of consecutive rows.
pub fn apply_pct_change(rows: &mut [PriceRow]) {
    let adj_closes: Vec<Option<f64>> = rows.iter().map(|r| r.adj_close).collect();
    for (row, change) in rows.iter_mut().zip(pct_change(&adj_closes)) {
        row.pct_change = change;
    }
}

/// Keeps the first row of every bucket, in input order, tagging it with the bucket start.
pub fn first_per_bucket(rows: Vec<PriceRow>, freq: Frequency) -> Vec<PriceRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter_map(|mut row| {
            let bucket = bucket_start(row.day(), freq);
            if seen.insert(bucket) {
                row.bucket = Some(bucket);
                Some(row)
            } else {
                None
            }
        })
        .collect()
}

/// Period returns of one ticker: first row per bucket, then percent change of
/// adjusted close between consecutive buckets. Buckets without a return are dropped.
pub fn period_returns(rows: &[PriceRow], freq: Frequency) -> Vec<(NaiveDate, f64)> {
    let kept = first_per_bucket(rows.to_vec(), freq);
    let adj_closes: Vec<Option<f64>> = kept.iter().map(|r| r.adj_close).collect();

    kept.iter()
        .zip(pct_change(&adj_closes))
        .filter_map(|(row, change)| Some((row.bucket?, change?)))
        .collect()
}
