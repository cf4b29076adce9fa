// src/table/mod.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, warn};

use crate::fetch::RawRow;

pub mod merge;

pub use merge::{clean_day_column, merge_csv_files, CleanStats, MergeStats};

pub const KEY_COLUMNS: [&str; 4] = ["Year", "Month", "Day", "Hour"];

/// Labels for the air quality summary table, in page order.
pub const AIR_QUALITY_COLUMNS: [&str; 10] = [
    "Year",
    "Month",
    "Day",
    "Hour",
    "Station",
    "O3 (ppb)",
    "PM2.5 (µg/m3)",
    "NO2 (ppb)",
    "SO2 (ppb)",
    "CO (ppm)",
];

/// How the Hour column is rendered on export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HourFormat {
    /// `0`..`23`, as scraped.
    #[default]
    TwentyFour,
    /// `12:00 AM`, `1:00 PM`, ...
    AmPm,
}

impl HourFormat {
    pub fn render(&self, hour: u32) -> String {
        match self {
            HourFormat::TwentyFour => hour.to_string(),
            HourFormat::AmPm => hour_to_ampm(hour),
        }
    }
}

/// `0 -> 12:00 AM`, `12 -> 12:00 PM`, `13 -> 1:00 PM`.
pub fn hour_to_ampm(hour: u32) -> String {
    match hour {
        0 => "12:00 AM".to_string(),
        12 => "12:00 PM".to_string(),
        h if h < 12 => format!("{}:00 AM", h),
        h => format!("{}:00 PM", h - 12),
    }
}

/// Rectangular string table: a header and rows of the same width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row, padding with empty cells or truncating to the table width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.width(), String::new());
        self.rows.push(row);
    }

    /// Overwrite `name` on every row, adding the column if it is missing.
    pub fn set_column(&mut self, name: &str, value: &str) {
        let idx = match self.column_index(name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        };
        let width = self.width();
        for row in &mut self.rows {
            row.resize(width, String::new());
            row[idx] = value.to_string();
        }
    }

    /// Stack tables, aligning by column name. The header is the union of all
    /// headers in first-seen order; cells a table lacks stay empty.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for t in &tables {
            for c in &t.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }
        let mut out = Table::new(columns);
        for t in tables {
            let mapping: Vec<usize> = t
                .columns
                .iter()
                .map(|c| out.column_index(c).unwrap_or_default())
                .collect();
            for row in t.rows {
                let mut aligned = vec![String::new(); out.width()];
                for (cell, &dst) in row.into_iter().zip(&mapping) {
                    aligned[dst] = cell;
                }
                out.rows.push(aligned);
            }
        }
        out
    }

    /// Parse CSV text with a header line. Ragged records are padded or cut to
    /// the header width; a leading byte-order mark is dropped.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let text = text.trim_start_matches('\u{feff}');
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let columns = rdr
            .headers()
            .context("reading CSV header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut table = Table::new(columns);
        for (i, rec) in rdr.records().enumerate() {
            match rec {
                Ok(rec) => table.push_row(rec.iter().map(str::to_string).collect()),
                Err(e) => warn!(line = i + 2, error = %e, "skipping unreadable CSV record"),
            }
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_csv_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut wtr = WriterBuilder::new()
            .from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()
            .with_context(|| format!("flushing {}", path.display()))?;
        debug!(path = %path.display(), rows = self.rows.len(), "wrote CSV");
        Ok(())
    }
}

/// Fields of a scraped row with the hour rendered as requested.
fn row_fields(row: &RawRow, hours: HourFormat) -> Vec<String> {
    let mut fields = row.clone().into_fields();
    fields[3] = hours.render(row.point.hour);
    fields
}

/// `Year, Month, Day, Hour, Column1..ColumnN` sized to the widest row.
pub fn numbered_columns(width: usize) -> Vec<String> {
    let extra = width.saturating_sub(KEY_COLUMNS.len());
    KEY_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain((1..=extra).map(|i| format!("Column{}", i)))
        .collect()
}

/// Table whose width is the widest row observed; shorter rows are padded.
pub fn numbered_table(rows: &[RawRow], hours: HourFormat) -> Table {
    let width = rows
        .iter()
        .map(RawRow::width)
        .max()
        .unwrap_or(KEY_COLUMNS.len());
    let mut table = Table::new(numbered_columns(width));
    for row in rows {
        table.push_row(row_fields(row, hours));
    }
    table
}

/// A row either matches the labelled schema or is kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapedRow {
    Expected(Vec<String>),
    Fallback(Vec<String>),
}

/// Fixed header applied to scraped rows of a known width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    labels: Vec<String>,
}

impl Schema {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            labels: labels.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    pub fn air_quality() -> Self {
        Self::new(&AIR_QUALITY_COLUMNS)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The schema cut down to `width` labels when rows are narrower than it.
    pub fn fitted(&self, width: usize) -> Schema {
        Schema {
            labels: self.labels.iter().take(width.max(KEY_COLUMNS.len())).cloned().collect(),
        }
    }

    pub fn shape(&self, fields: Vec<String>) -> ShapedRow {
        if fields.len() == self.labels.len() {
            ShapedRow::Expected(fields)
        } else {
            ShapedRow::Fallback(fields)
        }
    }
}

/// Output of [`labelled_table`]: conforming rows under the schema labels,
/// everything else under numbered columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labelled {
    pub table: Table,
    pub fallback: Table,
}

/// Apply `schema` to the scraped rows. The schema is trimmed to the widest
/// row when the page carried fewer columns than it names; rows of any other
/// width go to the fallback table instead of being silently misaligned.
pub fn labelled_table(rows: &[RawRow], schema: &Schema, hours: HourFormat) -> Labelled {
    let widest = rows.iter().map(RawRow::width).max().unwrap_or(0);
    let schema = schema.fitted(widest.min(schema.labels.len()));
    let mut table = Table::new(schema.labels().to_vec());
    let mut odd = Vec::new();
    for row in rows {
        match schema.shape(row_fields(row, hours)) {
            ShapedRow::Expected(fields) => table.rows.push(fields),
            ShapedRow::Fallback(fields) => odd.push(fields),
        }
    }
    let fallback_width = odd.iter().map(Vec::len).max().unwrap_or(KEY_COLUMNS.len());
    let mut fallback = Table::new(numbered_columns(fallback_width));
    for fields in odd {
        fallback.push_row(fields);
    }
    if !fallback.is_empty() {
        warn!(
            rows = fallback.len(),
            expected_width = table.width(),
            "rows did not match the labelled schema"
        );
    }
    Labelled { table, fallback }
}
