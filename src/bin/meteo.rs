use anyhow::Result;
use clap::Parser;
use envscrape::{http, meteo, ScrapeConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Download hourly weather for the selected stations.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output CSV
    #[arg(long)]
    output: Option<PathBuf>,

    /// First month, YYYY-MM
    #[arg(long)]
    start: Option<String>,

    /// Last month, YYYY-MM
    #[arg(long)]
    end: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    let mut cfg = ScrapeConfig::load(args.config.as_deref())?.meteo;
    if let Some(p) = args.output {
        cfg.output = p;
    }
    if let Some(s) = args.start {
        cfg.start = s;
    }
    if let Some(e) = args.end {
        cfg.end = e;
    }
    cfg.validate()?;

    let client = http::build_client(cfg.timeout())?;
    let rows = meteo::run(&client, &cfg).await?;
    info!(rows, "done");
    Ok(())
}
