//! Worker scaling configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Assumed fixed start-up cost of one worker, in seconds.
pub const WORKER_OVERHEAD_SECS: u64 = 4;

/// Assumed cost of ingesting one backup result, in seconds.
pub const SECS_PER_RESULT: u64 = 4;

/// Worker scaling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Upper bound on workers invoked per cycle
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
    /// Time budget of one worker; an estimate, never enforced
    #[serde(default = "default_max_worker_time_seconds")]
    pub max_worker_time_seconds: u64,
    /// Seconds between consumer cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_max_workers() -> u32 {
    5
}

fn default_max_worker_time_seconds() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_worker_time_seconds: default_max_worker_time_seconds(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl WorkerConfig {
    /// Rejects values that make the scaling estimate meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::config("worker.max_workers must be at least 1"));
        }
        if self.max_worker_time_seconds <= WORKER_OVERHEAD_SECS {
            return Err(Error::config(format!(
                "worker.max_worker_time_seconds must exceed the {}s worker overhead",
                WORKER_OVERHEAD_SECS
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::config("worker.poll_interval_secs must be at least 1"));
        }
        Ok(())
    }

    /// Estimated number of results one worker drains within its time budget.
    ///
    /// Returns `None` when the budget does not even cover the fixed overhead.
    pub fn results_per_worker(&self) -> Option<f64> {
        if self.max_worker_time_seconds <= WORKER_OVERHEAD_SECS {
            return None;
        }
        Some((self.max_worker_time_seconds - WORKER_OVERHEAD_SECS) as f64 / SECS_PER_RESULT as f64)
    }

    /// Whole number of results a single worker should claim, at least one.
    pub fn max_items_per_worker(&self) -> usize {
        self.results_per_worker()
            .map(|n| n.floor() as usize)
            .unwrap_or(1)
            .max(1)
    }
}
