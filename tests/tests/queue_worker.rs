//! Tests for queue draining and worker fan-out.

use std::sync::Arc;

use ingest_core::{
    BackupResultStore, BackupStatus, ContentStorage, Error, QueueMessage, ResultQueue,
    WorkerConfig,
};
use integration_tests::{
    fixtures::{self, CLIENT_ID, CLIENT_KEY},
    mocks::{MockQueue, MockStore},
    setup::TestContext,
};
use storage::LocalContentStorage;
use tempfile::TempDir;
use worker::{
    InProcessInvoker, IngestContext, IngestionPipeline, JsonPayloadExtractor,
    MetadataExtractorChain, QueueConsumer, QueueWorker, ReportParser, UnconfiguredInvoker,
};

fn http_post(ctx: &TestContext, id: &str, backup_id: &str) -> QueueMessage {
    ctx.storage.put(backup_id, fixtures::line_report());
    let body = fixtures::http_post_notification(CLIENT_ID, CLIENT_KEY, "borg", backup_id);
    fixtures::message(id, &body)
}

/// Rejected messages are acknowledged; an unclassified failure stops the drain and
/// hands the failed and unprocessed messages back to the queue
#[tokio::test]
async fn test_drain_ack_semantics() {
    let ctx = TestContext::new();
    ctx.queue.push(http_post(&ctx, "1", "b-1"));
    ctx.queue.push(QueueMessage::new("2", "not json"));
    // No stored content: storage error
    let orphan = fixtures::http_post_notification(CLIENT_ID, CLIENT_KEY, "borg", "b-3");
    ctx.queue.push(fixtures::message("3", &orphan));
    ctx.queue.push(http_post(&ctx, "4", "b-4"));

    let err = QueueWorker::with_max_items(ctx.pipeline.clone(), 10)
        .drain()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(ctx.queue.acknowledged(), vec!["1".to_string(), "2".to_string()]);
    assert_eq!(ctx.store.result_count(), 1);
    assert_eq!(ctx.queue.pending_count(), 2);

    // Content shows up; the next drain picks up where the failed one stopped
    ctx.storage.put("b-3", fixtures::line_report());
    let report = QueueWorker::with_max_items(ctx.pipeline.clone(), 10)
        .drain()
        .await
        .unwrap();

    assert_eq!(report.received, 2);
    assert_eq!(report.ingested, 2);
    assert_eq!(ctx.queue.acknowledged(), vec!["1", "2", "3", "4"]);
    assert_eq!(ctx.store.result_count(), 3);
    assert_eq!(ctx.queue.pending_count(), 0);
}

/// A failure on the first message of a batch loses nothing
#[tokio::test]
async fn test_failed_head_releases_whole_batch() {
    let ctx = TestContext::new();
    let orphan = fixtures::http_post_notification(CLIENT_ID, CLIENT_KEY, "borg", "b-1");
    ctx.queue.push(fixtures::message("1", &orphan));
    ctx.queue.push(http_post(&ctx, "2", "b-2"));

    let err = QueueWorker::with_max_items(ctx.pipeline.clone(), 10)
        .drain()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert!(ctx.queue.acknowledged().is_empty());
    assert_eq!(ctx.store.result_count(), 0);
    assert_eq!(ctx.queue.available_backup_results().await.unwrap(), 2);

    ctx.storage.put("b-1", fixtures::line_report());
    let report = QueueWorker::with_max_items(ctx.pipeline.clone(), 10)
        .drain()
        .await
        .unwrap();

    assert_eq!(report.received, 2);
    assert_eq!(ctx.queue.acknowledged(), vec!["1", "2"]);
    assert_eq!(ctx.store.result_count(), 2);
}

/// A drain never receives more than its item budget
#[tokio::test]
async fn test_drain_respects_max_items() {
    let ctx = TestContext::new();
    for i in 0..4 {
        ctx.queue.push(http_post(&ctx, &i.to_string(), &format!("b-{i}")));
    }

    let report = QueueWorker::with_max_items(ctx.pipeline.clone(), 3)
        .drain()
        .await
        .unwrap();

    assert_eq!(report.received, 3);
    assert_eq!(report.ingested, 3);
    assert_eq!(report.rejected, 0);
    assert_eq!(ctx.queue.pending_count(), 1);
}

/// 9 results with 24s workers: 2 workers of 5 items drain the whole queue
#[tokio::test]
async fn test_consumer_drains_queue_in_process() {
    let config = WorkerConfig {
        max_workers: 5,
        max_worker_time_seconds: 24,
        ..WorkerConfig::default()
    };
    let ctx = TestContext::with_config(config.clone());
    for i in 0..9 {
        ctx.queue.push(http_post(&ctx, &i.to_string(), &format!("b-{i}")));
    }

    let invoker = Arc::new(InProcessInvoker::new(ctx.worker()));
    let consumer = QueueConsumer::new(Arc::new(ctx.queue.clone()), invoker, config);
    let summary = consumer.run().await;

    assert_eq!(summary.available, 9);
    assert_eq!(summary.workers, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(ctx.queue.pending_count(), 0);
    assert_eq!(ctx.queue.acknowledged().len(), 9);
    assert_eq!(ctx.store.result_count(), 9);
}

/// Failing invocations are isolated and the cycle still completes
#[tokio::test]
async fn test_consumer_survives_failing_workers() {
    let ctx = TestContext::new();
    for i in 0..3 {
        ctx.queue.push(http_post(&ctx, &i.to_string(), &format!("b-{i}")));
    }

    let consumer = QueueConsumer::new(
        Arc::new(ctx.queue.clone()),
        Arc::new(UnconfiguredInvoker),
        ctx.config.clone(),
    );
    let summary = consumer.run().await;

    assert_eq!(summary.workers, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(ctx.queue.pending_count(), 3);
}

/// A failing depth query is treated as an empty queue
#[tokio::test]
async fn test_consumer_treats_count_failure_as_empty() {
    let ctx = TestContext::new();
    ctx.queue.set_should_fail(true);

    let invoker = Arc::new(InProcessInvoker::new(ctx.worker()));
    let consumer = QueueConsumer::new(Arc::new(ctx.queue.clone()), invoker, ctx.config.clone());
    let summary = consumer.run().await;

    assert_eq!(summary.available, 0);
    assert_eq!(summary.workers, 0);
}

/// Report parsing and filesystem archiving end to end
#[tokio::test]
async fn test_ingest_with_report_parser_and_local_storage() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(LocalContentStorage::new(dir.path()));
    storage
        .put_backup_result_content("b-1", fixtures::email_report().as_bytes())
        .await
        .unwrap();

    let queue = MockQueue::new();
    let store = MockStore::new();
    store.add_client(CLIENT_ID, CLIENT_KEY);

    let ctx = IngestContext::new(
        Arc::new(queue.clone()) as Arc<dyn ResultQueue>,
        Arc::new(store.clone()) as Arc<dyn BackupResultStore>,
        storage.clone() as Arc<dyn ContentStorage>,
        Arc::new(ReportParser::new()),
        WorkerConfig::default(),
    );
    let pipeline = IngestionPipeline::new(
        ctx,
        Arc::new(JsonPayloadExtractor::new()),
        Arc::new(MetadataExtractorChain::default()),
    );

    let receipt = fixtures::email_receipt(CLIENT_ID, CLIENT_KEY, "restic", "b-1");
    queue.push(fixtures::message("1", &fixtures::sns_envelope(&receipt)));

    let report = QueueWorker::new(pipeline).drain().await.unwrap();
    assert_eq!(report.ingested, 1);

    let results = store.results();
    assert_eq!(results.len(), 1);
    let (meta, metrics) = &results[0];
    assert_eq!(meta.backup_type, "restic");
    assert_eq!(metrics.status, BackupStatus::Success);
    assert_eq!(metrics.file_count, Some(312));
    assert_eq!(metrics.effective_duration_seconds(), Some(270.0));

    assert!(!storage.incoming_path("b-1").unwrap().exists());
    let archived = std::fs::read_dir(dir.path().join("archive")).unwrap().count();
    assert_eq!(archived, 1);
}
