use anyhow::Result;
use clap::Parser;
use envscrape::table::{clean_day_column, merge_csv_files};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Merge yearly air quality exports and drop rows with a non-numeric Day.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// CSV files to merge, in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, default_value = "merged_air_quality_data.csv")]
    merged: PathBuf,

    #[arg(long, default_value = "merged_air_quality_data_cleaned.csv")]
    cleaned: PathBuf,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    merge_csv_files(&args.inputs, &args.merged)?;
    clean_day_column(&args.merged, &args.cleaned)?;
    Ok(())
}
