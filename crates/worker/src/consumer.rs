//! Queue worker: claims queued notifications and ingests them.
//!
//! One drain:
//! 1. Receive up to `max_items` messages
//! 2. Ingest each with a fresh ingest id
//! 3. Acknowledge ingested and rejected messages
//!
//! A classified rejection is terminal for its message, so the message is
//! acknowledged. Any other failure stops the drain and releases the failed
//! message and every claimed message after it back to the queue.

use std::time::Instant;

use ingest_core::{Error, QueueMessage, Result};
use telemetry::metrics;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::pipeline::IngestionPipeline;

/// Counts from one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub received: usize,
    pub ingested: usize,
    pub rejected: usize,
}

/// Worker that drains the queue through the ingestion pipeline.
#[derive(Clone)]
pub struct QueueWorker {
    pipeline: IngestionPipeline,
    max_items: usize,
}

impl QueueWorker {
    /// Creates a worker sized from the pipeline's worker configuration.
    pub fn new(pipeline: IngestionPipeline) -> Self {
        let max_items = pipeline.context().config.max_items_per_worker();
        Self::with_max_items(pipeline, max_items)
    }

    pub fn with_max_items(pipeline: IngestionPipeline, max_items: usize) -> Self {
        Self {
            pipeline,
            max_items: max_items.max(1),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Drains up to `max_items` messages.
    pub async fn drain(&self) -> Result<DrainReport> {
        let queue = &self.pipeline.context().queue;
        let messages = queue.receive_backup_results(self.max_items).await?;

        let mut report = DrainReport {
            received: messages.len(),
            ..Default::default()
        };
        if messages.is_empty() {
            debug!("Queue worker found nothing to drain");
            return Ok(report);
        }

        for (index, message) in messages.iter().enumerate() {
            let ingest_id = Uuid::new_v4();
            let start = Instant::now();

            match self.pipeline.ingest_queued_backup_result(ingest_id, message).await {
                Ok(_) => {
                    metrics()
                        .ingest_latency_ms
                        .observe(start.elapsed().as_millis() as u64);
                    metrics().results_ingested.inc();
                    report.ingested += 1;
                }
                Err(Error::InvalidPayload(rejection)) => {
                    metrics().results_rejected.inc();
                    report.rejected += 1;
                    warn!(
                        ingest_id = %ingest_id,
                        message_id = %message.id,
                        code = %rejection.code,
                        backup_id = rejection.backup_id.as_deref().unwrap_or("-"),
                        context = %serde_json::Value::Object(rejection.context.clone()),
                        "Rejected backup result"
                    );
                }
                Err(e) => {
                    metrics().ingest_failures.inc();
                    error!(
                        ingest_id = %ingest_id,
                        message_id = %message.id,
                        error = %e,
                        "Failed to ingest backup result"
                    );
                    self.release(&messages[index..]).await;
                    return Err(e);
                }
            }

            if let Err(e) = self.acknowledge(message).await {
                self.release(&messages[index + 1..]).await;
                return Err(e);
            }
        }

        Ok(report)
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<()> {
        self.pipeline.context().queue.acknowledge(message).await
    }

    /// Hands unprocessed messages back; the ingest error takes precedence
    /// over a release failure.
    async fn release(&self, unprocessed: &[QueueMessage]) {
        if let Err(e) = self.pipeline.context().queue.release(unprocessed).await {
            error!(
                count = unprocessed.len(),
                error = %e,
                "Failed to release unprocessed backup results"
            );
        } else {
            debug!(count = unprocessed.len(), "Released unprocessed backup results");
        }
    }
}
