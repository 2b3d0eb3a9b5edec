//! Common test setup functions.

use std::sync::Arc;

use ingest_core::WorkerConfig;
use worker::{
    IngestContext, IngestionPipeline, JsonPayloadExtractor, MetadataExtractorChain, QueueWorker,
};

use crate::fixtures::{CLIENT_ID, CLIENT_KEY};
use crate::mocks::{MockParser, MockQueue, MockStorage, MockStore};

/// Pipeline wired to mocks of every collaborator.
///
/// The store knows one client, [`CLIENT_ID`] with key [`CLIENT_KEY`].
pub struct TestContext {
    pub queue: MockQueue,
    pub store: MockStore,
    pub storage: MockStorage,
    pub parser: MockParser,
    pub config: WorkerConfig,
    pub pipeline: IngestionPipeline,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(WorkerConfig::default())
    }

    pub fn with_config(config: WorkerConfig) -> Self {
        let queue = MockQueue::new();
        let store = MockStore::new();
        let storage = MockStorage::new();
        let parser = MockParser::new();
        store.add_client(CLIENT_ID, CLIENT_KEY);

        let ctx = IngestContext::new(
            Arc::new(queue.clone()),
            Arc::new(store.clone()),
            Arc::new(storage.clone()),
            Arc::new(parser.clone()),
            config.clone(),
        );
        let pipeline = IngestionPipeline::new(
            ctx,
            Arc::new(JsonPayloadExtractor::new()),
            Arc::new(MetadataExtractorChain::default()),
        );

        Self {
            queue,
            store,
            storage,
            parser,
            config,
            pipeline,
        }
    }

    /// Queue worker draining this context's queue.
    pub fn worker(&self) -> QueueWorker {
        QueueWorker::new(self.pipeline.clone())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
