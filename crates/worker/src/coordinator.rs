//! Queue consumer coordinator: sizes and launches the workers of one
//! draining cycle.

use std::sync::Arc;

use ingest_core::{ResultQueue, WorkerConfig};
use telemetry::metrics;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::invoker::WorkerInvoker;

/// Workers launched at least for every this many results, up to
/// [`MIN_WORKERS_CAP`].
const RESULTS_PER_MIN_WORKER: f64 = 10.0;

/// Upper bound of the load-independent minimum worker count.
const MIN_WORKERS_CAP: u64 = 3;

/// Worker count decision for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerPlan {
    pub results_per_worker: f64,
    pub min_workers: u64,
    pub worker_count: u64,
}

/// Computes how many workers to launch for `available` results.
///
/// `results_per_worker = (max_time - 4) / 4`, `min_workers = min(3,
/// ceil(available / 10))`, and the count is `max(min_workers,
/// min(max_workers, ceil(available / results_per_worker)))`. A time budget
/// that does not cover the fixed overhead counts as one result per worker.
pub fn plan_workers(available: u64, config: &WorkerConfig) -> WorkerPlan {
    let results_per_worker = config.results_per_worker().unwrap_or_else(|| {
        warn!(
            max_worker_time_seconds = config.max_worker_time_seconds,
            "Worker time budget does not cover overhead, assuming one result per worker"
        );
        1.0
    });

    let available_f = available as f64;
    let min_workers = MIN_WORKERS_CAP.min((available_f / RESULTS_PER_MIN_WORKER).ceil() as u64);
    let wanted = (available_f / results_per_worker).ceil() as u64;
    let worker_count = min_workers.max(wanted.min(u64::from(config.max_workers)));

    WorkerPlan {
        results_per_worker,
        min_workers,
        worker_count,
    }
}

/// Outcome of one consumer cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerRunSummary {
    pub available: u64,
    pub workers: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Polls the queue and fans out worker invocations.
pub struct QueueConsumer {
    queue: Arc<dyn ResultQueue>,
    invoker: Arc<dyn WorkerInvoker>,
    config: WorkerConfig,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn ResultQueue>, invoker: Arc<dyn WorkerInvoker>, config: WorkerConfig) -> Self {
        Self {
            queue,
            invoker,
            config,
        }
    }

    /// Runs one cycle. Never fails: a failing count query counts as an
    /// empty queue and worker failures are logged per invocation.
    pub async fn run(&self) -> ConsumerRunSummary {
        metrics().consumer_cycles.inc();

        let available = match self.queue.available_backup_results().await {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "Failed to count available backup results");
                0
            }
        };
        metrics().available_results.set(available);

        if available == 0 {
            debug!("No backup results available");
            return ConsumerRunSummary::default();
        }

        let plan = plan_workers(available, &self.config);
        info!(
            available = available,
            results_per_worker = plan.results_per_worker,
            min_workers = plan.min_workers,
            workers = plan.worker_count,
            "Invoking queue workers"
        );

        let mut invocations = JoinSet::new();
        for worker in 0..plan.worker_count {
            let invoker = self.invoker.clone();
            invocations.spawn(async move { (worker, invoker.invoke_queue_worker().await) });
        }
        metrics().workers_invoked.inc_by(plan.worker_count);

        let mut summary = ConsumerRunSummary {
            available,
            workers: plan.worker_count,
            ..Default::default()
        };

        while let Some(joined) = invocations.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.succeeded += 1,
                Ok((worker, Err(e))) => {
                    summary.failed += 1;
                    error!(worker = worker, error = %e, "Queue worker invocation failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "Queue worker invocation panicked");
                }
            }
        }
        metrics().worker_failures.inc_by(summary.failed);

        info!(
            available = summary.available,
            workers = summary.workers,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Queue consumer cycle complete"
        );
        summary
    }
}
