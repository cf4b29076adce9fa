use anyhow::Result;
use clap::Parser;
use envscrape::{air_quality, config::Span, http, ScrapeConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Scrape hourly air quality summaries over a year/month/day/hour grid.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML config; defaults are used for anything it leaves out
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output CSV
    #[arg(long)]
    output: Option<PathBuf>,

    /// CSV for rows that do not fit the labelled schema
    #[arg(long)]
    raw_output: Option<PathBuf>,

    /// JSON batch report
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long)]
    year_start: Option<u32>,

    #[arg(long)]
    year_end: Option<u32>,

    /// Maximum concurrent requests
    #[arg(long)]
    permits: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let mut cfg = ScrapeConfig::load(args.config.as_deref())?.air_quality;
    if let Some(p) = args.output {
        cfg.output = p;
    }
    if args.raw_output.is_some() {
        cfg.raw_output = args.raw_output;
    }
    if args.report.is_some() {
        cfg.report = args.report;
    }
    if let Some(n) = args.permits {
        cfg.fetch.permits = n;
    }
    let start = args.year_start.unwrap_or(cfg.grid.years.start);
    let end = args.year_end.unwrap_or(start.max(cfg.grid.years.end));
    cfg.grid.years = Span::new(start, end);

    let client = http::build_client(cfg.fetch.timeout())?;
    let report = air_quality::run(client, &cfg).await?;
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        rows = report.rows,
        "Scraping complete"
    );
    Ok(())
}
