//! Collaborator interfaces consumed by the ingestion pipeline.
//!
//! Concrete implementations live in the adapter crates (`redpanda`,
//! `clickhouse-client`, `storage`) and in `worker::parse`; tests use
//! in-memory mocks.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::Result;
use crate::message::QueueMessage;
use crate::meta::{BackupResultMeta, Client};
use crate::report::BackupMetrics;

/// Queue holding received backup result notifications.
#[async_trait]
pub trait ResultQueue: Send + Sync {
    /// Number of notifications waiting to be ingested.
    async fn available_backup_results(&self) -> Result<u64>;

    /// Claims up to `max` notifications.
    async fn receive_backup_results(&self, max: usize) -> Result<Vec<QueueMessage>>;

    /// Marks a notification as handled so it is not delivered again.
    async fn acknowledge(&self, message: &QueueMessage) -> Result<()>;

    /// Returns claimed but unhandled notifications to the queue. They are
    /// delivered again by a later `receive_backup_results`, in order.
    async fn release(&self, messages: &[QueueMessage]) -> Result<()>;
}

/// Database of clients and ingested backup results.
#[async_trait]
pub trait BackupResultStore: Send + Sync {
    /// Looks up a client by id. `None` means no such client.
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>>;

    /// Persists metadata together with its metrics in a single write.
    async fn add_backup_result(&self, meta: &BackupResultMeta, metrics: &BackupMetrics)
        -> Result<()>;
}

/// Blob storage holding the raw content of backup results.
#[async_trait]
pub trait ContentStorage: Send + Sync {
    async fn get_backup_result_content(&self, backup_id: &str) -> Result<Bytes>;

    /// Moves content out of the incoming area, tagged with the ingest that
    /// consumed it.
    async fn archive_backup_result_content(&self, backup_id: &str, ingest_id: Uuid) -> Result<()>;
}

/// Parser turning stored content into metrics.
#[async_trait]
pub trait MetricsParser: Send + Sync {
    async fn extract_email_metrics(&self, backup_type: &str, content: &[u8])
        -> Result<BackupMetrics>;

    async fn extract_http_post_metrics(
        &self,
        backup_type: &str,
        content: &[u8],
    ) -> Result<BackupMetrics>;
}
