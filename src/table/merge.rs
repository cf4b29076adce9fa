// src/table/merge.rs

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::{fs::File, path::Path};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub files: usize,
    pub skipped_files: usize,
    pub rows: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub kept: usize,
    pub dropped: usize,
}

/// Concatenate CSV exports that share the first file's header into `output`.
/// Files with a different header and unreadable records are logged and skipped.
pub fn merge_csv_files<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<MergeStats> {
    if inputs.is_empty() {
        bail!("nothing to merge");
    }
    let mut stats = MergeStats::default();
    let mut header: Option<StringRecord> = None;
    let mut wtr = WriterBuilder::new()
        .flexible(true)
        .from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;

    for input in inputs {
        let input = input.as_ref();
        let mut rdr = match ReaderBuilder::new().flexible(true).from_path(input) {
            Ok(r) => r,
            Err(e) => {
                warn!(file = %input.display(), error = %e, "skipping unreadable file");
                stats.skipped_files += 1;
                continue;
            }
        };
        let this_header = match rdr.headers() {
            Ok(h) => h.clone(),
            Err(e) => {
                warn!(file = %input.display(), error = %e, "unreadable header, skipping file");
                stats.skipped_files += 1;
                continue;
            }
        };
        match header.as_ref().map(|h| h.iter().eq(this_header.iter())) {
            None => {
                wtr.write_record(&this_header)?;
                header = Some(this_header);
            }
            Some(false) => {
                warn!(file = %input.display(), "header differs from first file, skipping");
                stats.skipped_files += 1;
                continue;
            }
            Some(true) => {}
        }

        for (i, rec) in rdr.records().enumerate() {
            match rec {
                Ok(rec) => {
                    wtr.write_record(&rec)?;
                    stats.rows += 1;
                }
                Err(e) => {
                    warn!(file = %input.display(), record = i + 1, error = %e, "skipping record");
                    stats.skipped_rows += 1;
                }
            }
        }
        stats.files += 1;
    }
    wtr.flush()?;
    info!(
        files = stats.files,
        rows = stats.rows,
        output = %output.display(),
        "merged CSV files"
    );
    Ok(stats)
}

/// Copy `input` to `output`, dropping rows whose `Day` is not numeric.
/// Those are stray header or notice lines that leaked into the export.
pub fn clean_day_column(input: &Path, output: &Path) -> Result<CleanStats> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);
    let header = rdr.headers()?.clone();
    let day = header
        .iter()
        .position(|h| h.trim() == "Day")
        .with_context(|| format!("no Day column in {}", input.display()))?;

    let mut wtr = WriterBuilder::new()
        .flexible(true)
        .from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;
    wtr.write_record(&header)?;

    let mut stats = CleanStats::default();
    for rec in rdr.records() {
        let keep = match &rec {
            Ok(r) => r.get(day).map(is_numeric).unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "dropping unreadable record");
                false
            }
        };
        match rec {
            Ok(r) if keep => {
                wtr.write_record(&r)?;
                stats.kept += 1;
            }
            _ => stats.dropped += 1,
        }
    }
    wtr.flush()?;
    info!(kept = stats.kept, dropped = stats.dropped, "cleaned CSV");
    Ok(stats)
}

fn is_numeric(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn merges_matching_headers_only() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("2012.csv");
        let b = tmp.path().join("2013.csv");
        let c = tmp.path().join("other.csv");
        fs::write(&a, "Year,Month,Day,Hour\n2012,1,1,0\n2012,1,1,1\n").unwrap();
        fs::write(&b, "Year,Month,Day,Hour\n2013,1,1,0\n").unwrap();
        fs::write(&c, "Station,Temp\nX,1\n").unwrap();
        let out = tmp.path().join("merged.csv");

        let stats = merge_csv_files(&[&a, &c, &b], &out).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.rows, 3);
        let merged = fs::read_to_string(&out).unwrap();
        assert_eq!(
            merged.lines().collect::<Vec<_>>(),
            vec!["Year,Month,Day,Hour", "2012,1,1,0", "2012,1,1,1", "2013,1,1,0"]
        );
    }

    #[test]
    fn unreadable_header_skips_only_that_file() {
        let tmp = tempdir().unwrap();
        let good = tmp.path().join("2012.csv");
        let bad = tmp.path().join("2013.csv");
        let late = tmp.path().join("2014.csv");
        fs::write(&good, "Year,Month,Day\n2012,1,1\n").unwrap();
        fs::write(&bad, b"Ye\xffar,Month,Day\n2013,1,1\n").unwrap();
        fs::write(&late, "Year,Month,Day\n2014,1,1\n").unwrap();
        let out = tmp.path().join("merged.csv");

        let stats = merge_csv_files(&[&good, &bad, &late], &out).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.rows, 2);
        let merged = fs::read_to_string(&out).unwrap();
        assert_eq!(
            merged.lines().collect::<Vec<_>>(),
            vec!["Year,Month,Day", "2012,1,1", "2014,1,1"]
        );
    }

    #[test]
    fn merge_needs_inputs() {
        let tmp = tempdir().unwrap();
        let none: [&Path; 0] = [];
        assert!(merge_csv_files(&none, &tmp.path().join("x.csv")).is_err());
    }

    #[test]
    fn drops_rows_with_non_numeric_day() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("in.csv");
        fs::write(
            &input,
            "Year,Month,Day,Hour,Station\n\
             2012,1,1,12:00 AM,Toronto\n\
             Year,Month,Day,Hour,Station\n\
             2012,1,,1:00 AM,Ottawa\n\
             2012,1,2.0,1:00 AM,Ottawa\n",
        )
        .unwrap();
        let output = tmp.path().join("out.csv");
        let stats = clean_day_column(&input, &output).unwrap();
        assert_eq!(stats, CleanStats { kept: 2, dropped: 2 });
        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("Toronto"));
        assert!(!text.contains(",,"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn clean_requires_day_column() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("in.csv");
        fs::write(&input, "A,B\n1,2\n").unwrap();
        assert!(clean_day_column(&input, &tmp.path().join("o.csv")).is_err());
    }
}
