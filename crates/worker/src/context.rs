//! Shared collaborators injected into the pipeline and the coordinator.

use std::sync::Arc;

use ingest_core::{BackupResultStore, ContentStorage, MetricsParser, ResultQueue, WorkerConfig};

/// Collaborators used by one ingestion deployment.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct IngestContext {
    pub queue: Arc<dyn ResultQueue>,
    pub store: Arc<dyn BackupResultStore>,
    pub storage: Arc<dyn ContentStorage>,
    pub parser: Arc<dyn MetricsParser>,
    pub config: WorkerConfig,
}

impl IngestContext {
    pub fn new(
        queue: Arc<dyn ResultQueue>,
        store: Arc<dyn BackupResultStore>,
        storage: Arc<dyn ContentStorage>,
        parser: Arc<dyn MetricsParser>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            store,
            storage,
            parser,
            config,
        }
    }
}
