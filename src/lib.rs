//! Scrapers for Ontario air quality history pages and federal hourly
//! weather archives, exporting flat CSV files.

pub mod air_quality;
pub mod config;
pub mod fetch;
pub mod http;
pub mod meteo;
pub mod table;

pub use config::ScrapeConfig;
pub use fetch::{Batch, BatchReport, FetchPoint, Fetcher, RawRow};
