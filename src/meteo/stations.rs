// src/meteo/stations.rs

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::config::MeteoConfig;
use crate::http::get_text;

/// Rows per search page; the site pages in hundreds.
pub const ROWS_PER_PAGE: u32 = 100;

static FORM: Lazy<Selector> =
    Lazy::new(|| Selector::parse("form[id]").expect("selector should parse"));
static STATION_ID: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[name="StationID"]"#).expect("selector should parse"));
static STATION_NAME: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.col-md-10.col-sm-8.col-xs-8").expect("selector should parse")
});
static YEAR_OPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"select[name="Year"] option"#).expect("selector should parse"));
static STATION_FORM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"stnRequest").expect("regex should parse"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub province: String,
    pub year_start: String,
    pub year_end: String,
}

/// URL of one station search results page (0-based `page`).
pub fn search_url(cfg: &MeteoConfig, page: u32) -> Result<Url> {
    let year = cfg.search_year.to_string();
    let start_row = (1 + page * ROWS_PER_PAGE).to_string();
    Url::parse_with_params(
        &cfg.search_url,
        &[
            ("searchType", "stnProv"),
            ("timeframe", "1"),
            ("lstProvince", cfg.province.as_str()),
            ("optLimit", "yearRange"),
            ("StartYear", year.as_str()),
            ("EndYear", year.as_str()),
            ("Year", year.as_str()),
            ("Month", "12"),
            ("Day", "31"),
            ("selRowPerPage", "100"),
            ("startRow", start_row.as_str()),
        ],
    )
    .with_context(|| format!("building search URL from {}", cfg.search_url))
}

/// Walk `max_pages` search pages and keep the selected stations.
/// A page that fails to download is logged and skipped.
pub async fn discover_stations(client: &Client, cfg: &MeteoConfig) -> Result<Vec<Station>> {
    let mut stations = Vec::new();
    for page in 0..cfg.max_pages {
        info!(page, "downloading station page");
        let url = search_url(cfg, page)?;
        let html = match get_text(client, &url).await {
            Ok(h) => h,
            Err(e) => {
                warn!(page, error = %e, "station page failed");
                continue;
            }
        };
        stations.extend(parse_station_page(&html, &cfg.province, &cfg.stations));
    }
    info!(count = stations.len(), "selected stations found");
    Ok(stations)
}

/// Every station form on a results page, filtered to `selected` names
/// (an empty list keeps all). Malformed forms are logged and skipped.
pub fn parse_station_page(html: &str, province: &str, selected: &[String]) -> Vec<Station> {
    let doc = Html::parse_document(html);
    doc.select(&FORM)
        .filter(|f| {
            f.value()
                .attr("id")
                .map(|id| STATION_FORM_ID.is_match(id))
                .unwrap_or(false)
        })
        .filter_map(|form| match parse_form(form, province) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "Error processing form");
                None
            }
        })
        .filter(|s| selected.is_empty() || selected.iter().any(|n| n == &s.name))
        .collect()
}

fn parse_form(form: ElementRef<'_>, province: &str) -> Result<Station> {
    let id = form
        .select(&STATION_ID)
        .next()
        .and_then(|i| i.value().attr("value"))
        .ok_or_else(|| anyhow!("no StationID input"))?;
    let name = form
        .select(&STATION_NAME)
        .next()
        .map(text_of)
        .ok_or_else(|| anyhow!("no station name for {}", id))?;
    let years: Vec<String> = form.select(&YEAR_OPTION).map(text_of).collect();
    let (first, last) = match (years.first(), years.last()) {
        (Some(f), Some(l)) => (f.clone(), l.clone()),
        _ => return Err(anyhow!("no year options for {}", id)),
    };
    Ok(Station {
        id: id.trim().to_string(),
        name,
        province: province.to_string(),
        year_start: first,
        year_end: last,
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
