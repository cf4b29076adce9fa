// src/air_quality.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::{fs, path::Path};
use tracing::info;

use crate::config::AirQualityConfig;
use crate::fetch::{Batch, BatchReport, Fetcher, RawRow};
use crate::table::{labelled_table, numbered_table, Schema, Table};

/// What an air quality run wrote.
#[derive(Debug, Clone, Default)]
pub struct Export {
    pub table: Table,
    pub fallback: Table,
}

/// Turn scraped rows into the configured output tables.
pub fn shape(rows: &[RawRow], cfg: &AirQualityConfig) -> Export {
    if cfg.relabel {
        let labelled = labelled_table(rows, &Schema::air_quality(), cfg.hour_format);
        Export {
            table: labelled.table,
            fallback: labelled.fallback,
        }
    } else {
        Export {
            table: numbered_table(rows, cfg.hour_format),
            fallback: Table::default(),
        }
    }
}

/// Scrape the configured grid and write the CSV (plus fallback rows and the
/// JSON report when those paths are set).
pub async fn run(client: Client, cfg: &AirQualityConfig) -> Result<BatchReport> {
    cfg.validate()?;
    let fetcher = Fetcher::new(client, &cfg.fetch)?;
    let points = cfg.grid.points();
    info!(points = points.len(), base = %cfg.fetch.base_url, "starting air quality scrape");

    let mut batch: Batch = fetcher.run(points).await?;
    if cfg.sort_output {
        batch.sort_rows();
    }

    let export = shape(&batch.rows, cfg);
    export.table.write_csv(&cfg.output)?;
    info!(path = %cfg.output.display(), rows = export.table.len(), "saved air quality data");

    if !export.fallback.is_empty() {
        match &cfg.raw_output {
            Some(path) => {
                export.fallback.write_csv(path)?;
                info!(path = %path.display(), rows = export.fallback.len(), "saved unmatched rows");
            }
            None => info!(
                rows = export.fallback.len(),
                "unmatched rows dropped (set raw_output to keep them)"
            ),
        }
    }

    if let Some(path) = &cfg.report {
        write_report(&batch.report, path)?;
    }
    Ok(batch.report)
}

pub fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("writing report {}", path.display()))
}
