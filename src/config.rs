// src/config.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::fetch::FetchPoint;
use crate::table::HourFormat;

/// Upper bound on `fetch.permits`, well below `tokio::sync::Semaphore::MAX_PERMITS`.
pub const MAX_PERMITS: usize = 1024;

/// Top-level configuration, read from an optional YAML file.
/// Missing keys fall back to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub air_quality: AirQualityConfig,
    pub meteo: MeteoConfig,
}

impl ScrapeConfig {
    /// Load from `path` if given, otherwise use defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.air_quality.validate().context("air_quality section")?;
        self.meteo.validate().context("meteo section")?;
        Ok(())
    }
}

/// Inclusive `start..=end` bound, serialized as `{ start, end }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + Clone {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            ((self.end - self.start) as usize).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cartesian grid of fetch points. No calendar filtering: every month gets days 1..=31.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Grid {
    pub years: Span,
    pub months: Span,
    pub days: Span,
    pub hours: Span,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            years: Span::new(2012, 2012),
            months: Span::new(1, 12),
            days: Span::new(1, 31),
            hours: Span::new(0, 23),
        }
    }
}

impl Grid {
    pub fn len(&self) -> usize {
        [self.months, self.days, self.hours]
            .iter()
            .fold(self.years.len(), |n, span| n.saturating_mul(span.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every point of the grid, in year/month/day/hour order.
    pub fn points(&self) -> Vec<FetchPoint> {
        let mut out = Vec::with_capacity(self.len());
        for year in self.years.iter() {
            for month in self.months.iter() {
                for day in self.days.iter() {
                    for hour in self.hours.iter() {
                        out.push(FetchPoint::new(year, month, day, hour));
                    }
                }
            }
        }
        out
    }

    fn validate(&self) -> Result<()> {
        for (name, span) in [
            ("years", self.years),
            ("months", self.months),
            ("days", self.days),
            ("hours", self.hours),
        ] {
            if span.is_empty() {
                bail!("grid.{} is empty ({}..={})", name, span.start, span.end);
            }
        }
        Ok(())
    }
}

/// Knobs of the bounded fetch loop.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    /// Class attribute of the `<table>` holding the data.
    pub table_class: String,
    /// Maximum number of requests in flight.
    pub permits: usize,
    pub max_attempts: u32,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    /// Treat a 200 page without the table as a failed attempt.
    pub retry_missing_table: bool,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.airqualityontario.com/history/summary.php".to_string(),
            table_class: "resourceTable".to_string(),
            permits: 5,
            max_attempts: 3,
            backoff_min_ms: 2_000,
            backoff_max_ms: 5_000,
            retry_missing_table: false,
            timeout_secs: 60,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.permits == 0 {
            bail!("permits must be at least 1");
        }
        if self.permits > MAX_PERMITS {
            bail!("permits ({}) exceeds the maximum of {}", self.permits, MAX_PERMITS);
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            bail!(
                "backoff_min_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_min_ms,
                self.backoff_max_ms
            );
        }
        url::Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url {:?}", self.base_url))?;
        if self.table_class.trim().is_empty() {
            bail!("table_class must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AirQualityConfig {
    pub fetch: FetchConfig,
    pub grid: Grid,
    pub output: PathBuf,
    /// Rows that do not fit the labelled schema land here.
    pub raw_output: Option<PathBuf>,
    /// Optional JSON batch report.
    pub report: Option<PathBuf>,
    /// Apply the station/pollutant labels instead of `Column1..N`.
    pub relabel: bool,
    pub hour_format: HourFormat,
    /// Sort rows into grid order before export.
    pub sort_output: bool,
}

impl Default for AirQualityConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            grid: Grid::default(),
            output: PathBuf::from("air_quality_data_2012.csv"),
            raw_output: None,
            report: None,
            relabel: true,
            hour_format: HourFormat::AmPm,
            sort_output: true,
        }
    }
}

impl AirQualityConfig {
    pub fn validate(&self) -> Result<()> {
        self.fetch.validate()?;
        self.grid.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MeteoConfig {
    pub search_url: String,
    pub bulk_url: String,
    pub province: String,
    /// Year used for the station search (start, end and selected year).
    pub search_year: i32,
    pub max_pages: u32,
    /// Station names to keep. Empty keeps every station found.
    pub stations: Vec<String>,
    pub probe_year: i32,
    pub probe_month: u32,
    /// First month to download, `YYYY-MM`.
    pub start: String,
    /// Last month to download (inclusive), `YYYY-MM`.
    pub end: String,
    pub output: PathBuf,
    pub timeout_secs: u64,
}

impl Default for MeteoConfig {
    fn default() -> Self {
        Self {
            search_url:
                "https://climate.weather.gc.ca/historical_data/search_historic_data_stations_e.html"
                    .to_string(),
            bulk_url: "https://climate.weather.gc.ca/climate_data/bulk_data_e.html".to_string(),
            province: "ON".to_string(),
            search_year: 2019,
            max_pages: 5,
            stations: DEFAULT_STATIONS.iter().map(|s| s.to_string()).collect(),
            probe_year: 2019,
            probe_month: 1,
            start: "2019-01".to_string(),
            end: "2019-12".to_string(),
            output: PathBuf::from("meteorological_weather_data_hourly_stations_2019.csv"),
            timeout_secs: 60,
        }
    }
}

impl MeteoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn start_month(&self) -> Result<NaiveDate> {
        parse_year_month(&self.start)
    }

    pub fn end_month(&self) -> Result<NaiveDate> {
        parse_year_month(&self.end)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.search_url)
            .with_context(|| format!("invalid search_url {:?}", self.search_url))?;
        url::Url::parse(&self.bulk_url)
            .with_context(|| format!("invalid bulk_url {:?}", self.bulk_url))?;
        if !(1..=12).contains(&self.probe_month) {
            bail!("probe_month must be 1..=12, got {}", self.probe_month);
        }
        let (start, end) = (self.start_month()?, self.end_month()?);
        if start > end {
            bail!("start {} is after end {}", self.start, self.end);
        }
        Ok(())
    }
}

/// Parse `YYYY-MM` into the first day of that month.
pub fn parse_year_month(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .with_context(|| format!("expected YYYY-MM, got {:?}", s))
}

static DEFAULT_STATIONS: &[&str] = &[
    "BARRIE LANDFILL",
    "BELLEVILLE",
    "BRANTFORD MOE",
    "BURLINGTON PIERS (AUT)",
    "CHATHAM KENT",
    "CORNWALL",
    "GUELPH TURFGRASS INSTITUTE",
    "HAMILTON A",
    "KINGSTON A",
    "KITCHENER/WATERLOO",
    "LONDON CS",
    "PA HERSHEY CENTRE",
    "MORRISBURG",
    "KING CITY NORTH",
    "NORTH BAY A",
    "OAKVILLE TWN",
    "OSHAWA",
    "OTTAWA CDA",
    "OTTAWA INTL A",
    "PARRY SOUND HARBOUR",
    "PETAWAWA A",
    "PETERBOROUGH A",
    "SARNIA CHRIS HADFIELD A",
    "SAULT STE MARIE A",
    "ST CATHARINES BROCK U",
    "SUDBURY CLIMATE",
    "THUNDER BAY A",
    "TORONTO CITY",
    "TORONTO CITY CENTRE",
    "TORONTO NORTH YORK",
    "TORONTO LESTER B. PEARSON INT'L A",
    "WINDSOR A",
    "WINDSOR RIVERSIDE",
];
