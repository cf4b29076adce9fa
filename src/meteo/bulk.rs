// src/meteo/bulk.rs

use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::config::MeteoConfig;
use crate::http::get_text;
use crate::table::Table;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Hourly (`timeframe=1`) bulk CSV URL for one station and month.
pub fn bulk_url(cfg: &MeteoConfig, station_id: &str, year: i32, month: u32) -> Result<Url> {
    let (year, month) = (year.to_string(), month.to_string());
    Url::parse_with_params(
        &cfg.bulk_url,
        &[
            ("format", "csv"),
            ("stationID", station_id),
            ("Year", year.as_str()),
            ("Month", month.as_str()),
            ("timeframe", "1"),
        ],
    )
    .with_context(|| format!("building bulk URL from {}", cfg.bulk_url))
}

/// Hourly files carry a time-of-day column; daily and monthly ones do not.
pub fn has_time_column(table: &Table) -> bool {
    table.columns.iter().any(|c| c.contains("Time"))
}

/// Download and parse one month of hourly data.
pub async fn fetch_month(
    client: &Client,
    cfg: &MeteoConfig,
    station_id: &str,
    year: i32,
    month: u32,
) -> Result<Table> {
    let url = bulk_url(cfg, station_id, year, month)?;
    let text = get_text(client, &url).await?;
    Table::from_csv_str(&text).with_context(|| format!("parsing CSV from {}", url))
}

/// Whether the station publishes hourly data for the given month.
/// Download or parse errors count as "no".
pub async fn has_hourly_data(
    client: &Client,
    cfg: &MeteoConfig,
    station_id: &str,
    year: i32,
    month: u32,
) -> bool {
    match fetch_month(client, cfg, station_id, year, month).await {
        Ok(table) => has_time_column(&table),
        Err(e) => {
            warn!(station = station_id, error = %e, "Error checking hourly data");
            false
        }
    }
}

/// Hourly data for one month, or `None` when it is missing or not hourly.
pub async fn hourly_month(
    client: &Client,
    cfg: &MeteoConfig,
    station_id: &str,
    year: i32,
    month: u32,
) -> Option<Table> {
    match fetch_month(client, cfg, station_id, year, month).await {
        Ok(table) if has_time_column(&table) => Some(table),
        Ok(_) => {
            debug!(station = station_id, year, month, "no time column");
            None
        }
        Err(e) => {
            warn!(station = station_id, year, month, error = %e, "Error fetching data");
            None
        }
    }
}

/// Months from `start` to `end` inclusive, as (year, month).
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut out = Vec::new();
    let mut cur = start.with_day(1).unwrap_or(start);
    while cur <= end {
        out.push((cur.year(), cur.month()));
        match cur.checked_add_months(Months::new(1)) {
            Some(next) => cur = next,
            None => break,
        }
    }
    out
}

/// Rewrite the first column whose name mentions `Date` or `Time` as
/// `YYYY-MM-DD HH:MM:SS`. Values that do not parse are left alone.
/// Returns the index of the rewritten column.
pub fn normalize_datetime(table: &mut Table) -> Option<usize> {
    let idx = table
        .columns
        .iter()
        .position(|c| c.contains("Date") || c.contains("Time"))?;
    for row in &mut table.rows {
        if let Some(cell) = row.get_mut(idx) {
            if let Some(dt) = parse_datetime(cell) {
                *cell = dt.format("%Y-%m-%d %H:%M:%S").to_string();
            }
        }
    }
    Some(idx)
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
