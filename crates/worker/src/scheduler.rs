//! Runs consumer cycles on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use telemetry::metrics;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::coordinator::QueueConsumer;

/// Ticks the queue consumer until shutdown is signalled.
pub struct ConsumerScheduler {
    consumer: Arc<QueueConsumer>,
    poll_interval: Duration,
}

impl ConsumerScheduler {
    pub fn new(consumer: Arc<QueueConsumer>, poll_interval: Duration) -> Self {
        Self {
            consumer,
            poll_interval,
        }
    }

    /// Runs cycles back to back, one per tick, until `shutdown` flips to
    /// `true`. A cycle in progress is allowed to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Queue consumer scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.consumer.run().await;
                    let snapshot = metrics().snapshot();
                    debug!(
                        cycles = snapshot.consumer_cycles,
                        ingested = snapshot.results_ingested,
                        rejected = snapshot.results_rejected,
                        failures = snapshot.ingest_failures,
                        worker_failures = snapshot.worker_failures,
                        ingest_latency_mean_ms = snapshot.ingest_latency_mean_ms,
                        "Ingest totals"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Queue consumer scheduler stopped");
    }
}
