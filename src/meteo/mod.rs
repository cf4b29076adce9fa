// src/meteo/mod.rs
//
// Hourly weather from the federal climate archive: find stations, keep the
// ones with hourly data, download every month of the range, stack it all.

use anyhow::Result;
use reqwest::Client;
use tracing::{info, instrument};

use crate::config::MeteoConfig;
use crate::table::Table;

pub mod bulk;
pub mod stations;

pub use bulk::{bulk_url, has_hourly_data, hourly_month, month_range, normalize_datetime};
pub use stations::{discover_stations, parse_station_page, Station};

pub const STATION_NAME_COLUMN: &str = "Station Name";

/// Run the whole pipeline. `Ok(None)` means nothing was collected.
#[instrument(level = "info", skip_all, fields(province = %cfg.province))]
pub async fn collect(client: &Client, cfg: &MeteoConfig) -> Result<Option<Table>> {
    let stations = discover_stations(client, cfg).await?;
    if stations.is_empty() {
        info!("No stations found");
        return Ok(None);
    }

    let mut available = Vec::new();
    for station in stations {
        if has_hourly_data(client, cfg, &station.id, cfg.probe_year, cfg.probe_month).await {
            available.push(station);
        } else {
            info!(station = %station.name, "no hourly data, skipping");
        }
    }
    info!(count = available.len(), "stations with hourly data");

    let months = month_range(cfg.start_month()?, cfg.end_month()?);
    let mut frames = Vec::new();
    for station in &available {
        info!(station = %station.name, id = %station.id, "Fetching data for station");
        for &(year, month) in &months {
            if let Some(mut frame) = hourly_month(client, cfg, &station.id, year, month).await {
                frame.set_column(STATION_NAME_COLUMN, &station.name);
                frames.push(frame);
            }
        }
    }

    if frames.is_empty() {
        info!("No data collected for any station");
        return Ok(None);
    }
    let mut weather = Table::concat(frames);
    normalize_datetime(&mut weather);
    info!(rows = weather.len(), columns = weather.width(), "weather data collected");
    Ok(Some(weather))
}

/// Collect and write the CSV configured in `cfg.output`. Returns the row count.
pub async fn run(client: &Client, cfg: &MeteoConfig) -> Result<usize> {
    match collect(client, cfg).await? {
        Some(table) => {
            table.write_csv(&cfg.output)?;
            info!(path = %cfg.output.display(), rows = table.len(), "Weather data saved");
            Ok(table.len())
        }
        None => Ok(0),
    }
}
