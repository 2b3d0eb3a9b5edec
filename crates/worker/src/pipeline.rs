//! Per-message ingestion pipeline.
//!
//! extract payload → extract metadata → verify client → fetch content →
//! extract metrics → persist → archive
//!
//! Steps run strictly in order and the first failure aborts the rest.
//! Persist and archive are two separate calls with no compensation: when
//! archiving fails after a successful persist, the record stays in the
//! database and the caller sees the archive error.

use std::sync::Arc;

use ingest_core::{
    BackupMetrics, BackupResultMeta, DeliveryType, Error, InvalidBackupPayload,
    InvalidPayloadCode, QueueMessage, Result,
};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::context::IngestContext;
use crate::extractors::MetadataExtractorChain;
use crate::payload::PayloadExtractor;

/// Metrics extractor selected by delivery type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricsSource {
    Email,
    HttpPost,
}

impl MetricsSource {
    fn for_delivery(delivery_type: &DeliveryType) -> Result<Self> {
        match delivery_type {
            DeliveryType::Email => Ok(Self::Email),
            DeliveryType::HttpPost => Ok(Self::HttpPost),
            DeliveryType::Unknown(other) => Err(Error::UnexpectedDeliveryType(other.clone())),
        }
    }
}

/// Runs queued backup result notifications through ingestion.
#[derive(Clone)]
pub struct IngestionPipeline {
    ctx: IngestContext,
    payload_extractor: Arc<dyn PayloadExtractor>,
    meta_chain: Arc<MetadataExtractorChain>,
}

impl IngestionPipeline {
    pub fn new(
        ctx: IngestContext,
        payload_extractor: Arc<dyn PayloadExtractor>,
        meta_chain: Arc<MetadataExtractorChain>,
    ) -> Self {
        Self {
            ctx,
            payload_extractor,
            meta_chain,
        }
    }

    pub fn context(&self) -> &IngestContext {
        &self.ctx
    }

    /// Ingests one dequeued message and returns the metadata it carried.
    pub async fn ingest_queued_backup_result(
        &self,
        ingest_id: Uuid,
        message: &QueueMessage,
    ) -> Result<BackupResultMeta> {
        trace!(ingest_id = %ingest_id, message_id = %message.id, "Extracting queue message payload");
        let payload = self
            .payload_extractor
            .extract_queue_message_payload(ingest_id, message)
            .await?;

        let meta = self.meta_chain.extract_backup_result_meta(ingest_id, &payload)?;
        self.ingest_backup_result(ingest_id, &meta).await?;

        Ok(meta)
    }

    /// Verifies, parses, persists and archives one backup result.
    pub async fn ingest_backup_result(&self, ingest_id: Uuid, meta: &BackupResultMeta) -> Result<()> {
        self.verify_client(ingest_id, meta).await?;

        let source = MetricsSource::for_delivery(&meta.delivery_type)?;

        trace!(ingest_id = %ingest_id, backup_id = %meta.backup_id, "Fetching backup result content");
        let content = self
            .ctx
            .storage
            .get_backup_result_content(&meta.backup_id)
            .await?;

        let metrics = self.extract_metrics(ingest_id, meta, source, &content).await?;
        debug!(
            ingest_id = %ingest_id,
            backup_id = %meta.backup_id,
            status = metrics.status.as_str(),
            "Extracted backup metrics"
        );

        self.ctx.store.add_backup_result(meta, &metrics).await?;
        trace!(ingest_id = %ingest_id, backup_id = %meta.backup_id, "Persisted backup result");

        self.ctx
            .storage
            .archive_backup_result_content(&meta.backup_id, ingest_id)
            .await?;

        info!(
            ingest_id = %ingest_id,
            client_id = %meta.client_id,
            backup_id = %meta.backup_id,
            delivery_type = %meta.delivery_type,
            "Ingested backup result"
        );
        Ok(())
    }

    /// Checks that the client exists and the presented key matches.
    async fn verify_client(&self, ingest_id: Uuid, meta: &BackupResultMeta) -> Result<()> {
        trace!(ingest_id = %ingest_id, client_id = %meta.client_id, "Verifying client");

        let rejection = |code, message: &str| -> Error {
            InvalidBackupPayload::new(ingest_id, code, message)
                .with_backup_id(meta.backup_id.clone())
                .with_context("clientId", meta.client_id.clone())
                .into()
        };

        let client = self
            .ctx
            .store
            .get_client(&meta.client_id)
            .await?
            .ok_or_else(|| rejection(InvalidPayloadCode::ClientNotFound, "client not found"))?;

        if !client.key_matches(&meta.client_key) {
            return Err(rejection(
                InvalidPayloadCode::ClientKeyMismatch,
                "client key does not match",
            ));
        }

        Ok(())
    }

    async fn extract_metrics(
        &self,
        ingest_id: Uuid,
        meta: &BackupResultMeta,
        source: MetricsSource,
        content: &[u8],
    ) -> Result<BackupMetrics> {
        let parser = &self.ctx.parser;

        match source {
            MetricsSource::Email => parser
                .extract_email_metrics(&meta.backup_type, content)
                .await
                .map_err(|err| {
                    InvalidBackupPayload::new(
                        ingest_id,
                        InvalidPayloadCode::ExtractMetrics,
                        "failed to extract email metrics",
                    )
                    .with_backup_id(meta.backup_id.clone())
                    .with_context("backupType", meta.backup_type.clone())
                    .with_context("error", err.to_string())
                    .into()
                }),
            // HTTP-POST parse failures are deliberately left unclassified.
            MetricsSource::HttpPost => {
                parser
                    .extract_http_post_metrics(&meta.backup_type, content)
                    .await
            }
        }
    }
}
