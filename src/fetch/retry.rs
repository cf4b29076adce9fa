// src/fetch/retry.rs

use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::config::FetchConfig;

/// Why a single attempt at a point did not produce rows.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("reading body failed: {0}")]
    Body(#[source] reqwest::Error),
    #[error("no table with class `{0}` on page")]
    MissingTable(String),
}

/// Attempt budget and randomized pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_min: Duration::from_millis(cfg.backoff_min_ms),
            backoff_max: Duration::from_millis(cfg.backoff_max_ms.max(cfg.backoff_min_ms)),
        }
    }

    /// Uniform random delay in `backoff_min..=backoff_max`.
    pub fn delay(&self) -> Duration {
        let lo = self.backoff_min.as_millis() as u64;
        let hi = self.backoff_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// State that follows a failed attempt number `attempt` (1-based).
    pub fn after_failure(&self, attempt: u32) -> PointState {
        if attempt < self.max_attempts {
            PointState::Retrying {
                attempt,
                delay: self.delay(),
            }
        } else {
            PointState::Failed { attempts: attempt }
        }
    }
}

/// Lifecycle of one fetch point.
///
/// `Pending -> Attempting(1) -> Succeeded`, or on failure
/// `Attempting(n) -> Retrying { n, delay } -> Attempting(n + 1)` until the
/// budget runs out and the point ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointState {
    Pending,
    Attempting(u32),
    Retrying { attempt: u32, delay: Duration },
    Succeeded { attempt: u32, rows: usize },
    Failed { attempts: u32 },
}

impl PointState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PointState::Succeeded { .. } | PointState::Failed { .. })
    }
}
