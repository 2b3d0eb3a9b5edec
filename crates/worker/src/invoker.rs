//! Worker launch strategies.

use async_trait::async_trait;
use ingest_core::{Error, Result};
use tracing::debug;

use crate::consumer::QueueWorker;

/// Launches one worker unit that drains and ingests queued results.
///
/// There is no default launch mechanism: an implementor that does not
/// override [`WorkerInvoker::invoke_queue_worker`] fails every invocation
/// with [`Error::NotImplemented`].
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn invoke_queue_worker(&self) -> Result<()> {
        Err(Error::not_implemented("invoke_queue_worker"))
    }
}

/// Placeholder for deployments that have not chosen a launch mechanism.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredInvoker;

#[async_trait]
impl WorkerInvoker for UnconfiguredInvoker {}

/// Runs each worker as a tokio task inside the current process.
#[derive(Clone)]
pub struct InProcessInvoker {
    worker: QueueWorker,
}

impl InProcessInvoker {
    pub fn new(worker: QueueWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl WorkerInvoker for InProcessInvoker {
    async fn invoke_queue_worker(&self) -> Result<()> {
        let worker = self.worker.clone();
        let report = tokio::spawn(async move { worker.drain().await })
            .await
            .map_err(|e| Error::internal(format!("queue worker task failed: {}", e)))??;

        debug!(
            received = report.received,
            ingested = report.ingested,
            rejected = report.rejected,
            "Queue worker finished"
        );
        Ok(())
    }
}
