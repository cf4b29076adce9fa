// src/fetch/mod.rs
//
// Bounded fetch loop: one task per grid point, a semaphore capping requests in
// flight, and a collector task receiving rows over a channel.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
    time::{sleep, Instant},
};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::FetchConfig;

pub mod html;
pub mod point;
pub mod retry;

pub use html::TableExtractor;
pub use point::{FetchPoint, RawRow};
pub use retry::{AttemptError, PointState, RetryPolicy};

const ROW_CHANNEL_CAPACITY: usize = 1024;

/// How one point ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointOutcome {
    pub point: FetchPoint,
    pub state: PointState,
    /// Failed attempts that were followed by another try.
    pub retries: u32,
}

/// Totals for a batch. Failed points are listed so they can be rerun.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub retries: u32,
    pub rows: usize,
    pub failures: Vec<FetchPoint>,
}

impl BatchReport {
    fn record(&mut self, outcome: &PointOutcome) {
        self.retries += outcome.retries;
        match outcome.state {
            PointState::Succeeded { .. } => self.succeeded += 1,
            _ => {
                self.failed += 1;
                self.failures.push(outcome.point);
            }
        }
    }
}

/// Rows gathered by a batch plus its report. Row order is completion order.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub rows: Vec<RawRow>,
    pub report: BatchReport,
}

impl Batch {
    /// Grid order. Rows of the same point keep their table order.
    pub fn sort_rows(&mut self) {
        self.rows.sort_by_key(|r| r.point);
    }
}

struct FetchContext {
    client: Client,
    base_url: Url,
    extractor: TableExtractor,
    policy: RetryPolicy,
    retry_missing_table: bool,
    permits: Arc<Semaphore>,
}

/// Drives the bounded fetch loop over a set of points.
#[derive(Clone)]
pub struct Fetcher {
    ctx: Arc<FetchContext>,
    permits: usize,
}

impl Fetcher {
    pub fn new(client: Client, cfg: &FetchConfig) -> Result<Self> {
        cfg.validate()?;
        let base_url = Url::parse(&cfg.base_url)
            .with_context(|| format!("parsing base URL {}", cfg.base_url))?;
        let ctx = FetchContext {
            client,
            base_url,
            extractor: TableExtractor::new(&cfg.table_class)?,
            policy: RetryPolicy::from_config(cfg),
            retry_missing_table: cfg.retry_missing_table,
            permits: Arc::new(Semaphore::new(cfg.permits)),
        };
        Ok(Self {
            ctx: Arc::new(ctx),
            permits: cfg.permits,
        })
    }

    /// Schedule every point at once and wait for all of them. Per-point
    /// failures never surface as errors; they are logged and counted.
    #[instrument(level = "info", skip_all, fields(points = points.len(), permits = self.permits))]
    pub async fn run(&self, points: Vec<FetchPoint>) -> Result<Batch> {
        let start = Instant::now();
        let (tx, mut rx) = mpsc::channel::<RawRow>(ROW_CHANNEL_CAPACITY);

        let collector = tokio::spawn(async move {
            let mut rows = Vec::new();
            while let Some(row) = rx.recv().await {
                rows.push(row);
            }
            rows
        });

        let mut report = BatchReport {
            scheduled: points.len(),
            ..BatchReport::default()
        };
        let mut tasks = JoinSet::new();
        for point in points {
            let ctx = Arc::clone(&self.ctx);
            let tx = tx.clone();
            tasks.spawn(async move { ctx.fetch_point(point, &tx).await });
        }
        // collector ends once every task has dropped its sender
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!(error = %e, "fetch task aborted");
                    report.failed += 1;
                }
            }
        }

        let rows = collector.await.context("row collector task")?;
        report.rows = rows.len();
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            retries = report.retries,
            rows = report.rows,
            elapsed = ?start.elapsed(),
            "batch finished"
        );
        Ok(Batch { rows, report })
    }
}

impl FetchContext {
    async fn fetch_point(&self, point: FetchPoint, tx: &mpsc::Sender<RawRow>) -> PointOutcome {
        // held until this function returns, whatever the outcome
        let _permit = match self.permits.acquire().await {
            Ok(p) => p,
            Err(e) => {
                error!(%point, error = %e, "permit pool closed");
                return PointOutcome {
                    point,
                    state: PointState::Failed { attempts: 0 },
                    retries: 0,
                };
            }
        };

        let mut state = PointState::Pending;
        let mut retries = 0;
        while !state.is_terminal() {
            state = match state {
                PointState::Pending => PointState::Attempting(1),
                PointState::Attempting(n) => match self.attempt(point).await {
                    Ok(rows) => {
                        let count = rows.len();
                        for cells in rows {
                            if tx.send(RawRow::new(point, cells)).await.is_err() {
                                warn!(%point, "row collector closed");
                                break;
                            }
                        }
                        debug!(%point, attempt = n, rows = count, "fetched");
                        PointState::Succeeded {
                            attempt: n,
                            rows: count,
                        }
                    }
                    Err(e) => {
                        let next = self.policy.after_failure(n);
                        match next {
                            PointState::Retrying { delay, .. } => {
                                retries += 1;
                                warn!(%point, attempt = n, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                            }
                            _ => {
                                error!(%point, attempts = n, error = %e, "final failure");
                            }
                        }
                        next
                    }
                },
                PointState::Retrying { attempt, delay } => {
                    sleep(delay).await;
                    PointState::Attempting(attempt + 1)
                }
                done @ (PointState::Succeeded { .. } | PointState::Failed { .. }) => done,
            };
        }
        PointOutcome {
            point,
            state,
            retries,
        }
    }

    /// One GET for `point`. A 2xx page without the table counts as an empty
    /// success unless `retry_missing_table` is set.
    async fn attempt(&self, point: FetchPoint) -> Result<Vec<Vec<String>>, AttemptError> {
        let resp = self
            .client
            .get(self.base_url.clone())
            .query(&point.query())
            .send()
            .await
            .map_err(AttemptError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }
        let body = resp.text().await.map_err(AttemptError::Body)?;
        match self.extractor.extract(&body) {
            Some(rows) => Ok(rows),
            None if self.retry_missing_table => Err(AttemptError::MissingTable(
                self.extractor.class().to_string(),
            )),
            None => {
                debug!(%point, "no table on page");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(point: FetchPoint, state: PointState, retries: u32) -> PointOutcome {
        PointOutcome {
            point,
            state,
            retries,
        }
    }

    #[test]
    fn report_counts_each_point_once() {
        let a = FetchPoint::new(2012, 1, 1, 0);
        let b = FetchPoint::new(2012, 1, 1, 1);
        let mut report = BatchReport::default();
        report.record(&outcome(a, PointState::Succeeded { attempt: 2, rows: 4 }, 1));
        report.record(&outcome(b, PointState::Failed { attempts: 3 }, 2));
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.retries, 3);
        assert_eq!(report.failures, vec![b]);
    }

    #[test]
    fn sort_rows_keeps_table_order_within_point() {
        let early = FetchPoint::new(2012, 1, 1, 0);
        let late = FetchPoint::new(2012, 1, 1, 5);
        let mut batch = Batch {
            rows: vec![
                RawRow::new(late, vec!["x".into()]),
                RawRow::new(early, vec!["first".into()]),
                RawRow::new(early, vec!["second".into()]),
            ],
            report: BatchReport::default(),
        };
        batch.sort_rows();
        let cells: Vec<_> = batch.rows.iter().map(|r| r.cells[0].as_str()).collect();
        assert_eq!(cells, vec!["first", "second", "x"]);
    }

    #[test]
    fn rejects_bad_config() {
        let cfg = FetchConfig {
            permits: 0,
            ..FetchConfig::default()
        };
        assert!(Fetcher::new(Client::new(), &cfg).is_err());

        // would otherwise panic inside Semaphore::new
        let cfg = FetchConfig {
            permits: usize::MAX,
            ..FetchConfig::default()
        };
        assert!(Fetcher::new(Client::new(), &cfg).is_err());
    }

    #[tokio::test]
    async fn empty_batch_finishes() {
        let fetcher = Fetcher::new(Client::new(), &FetchConfig::default()).unwrap();
        let batch = fetcher.run(Vec::new()).await.unwrap();
        assert!(batch.rows.is_empty());
        assert_eq!(batch.report, BatchReport::default());
    }
}
