//! Backup result queue on a Redpanda topic.
//!
//! Uses rskafka against partition 0 with offsets tracked in memory by an
//! [`OffsetTracker`]. `receive` claims records under a lock so concurrent
//! workers never see the same record; `release` rewinds the fetch position
//! so unhandled records are delivered again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use ingest_core::{Error, QueueMessage, Result, ResultQueue};
use rskafka::client::{
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    ClientBuilder, Credentials, SaslConfig,
};
use rskafka::record::RecordAndOffset;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::config::{RedpandaConfig, StartOffset};
use crate::offsets::OffsetTracker;

/// Creates a TLS configuration for Redpanda Cloud.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Client builder with TLS and SASL when credentials are configured.
pub(crate) fn client_builder(config: &RedpandaConfig) -> ClientBuilder {
    let builder = ClientBuilder::new(vec![config.broker_string()]);

    match config.credentials() {
        Some((username, password)) => builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.to_string(),
                password.to_string(),
            ))),
        None => builder,
    }
}

fn parse_offset(message: &QueueMessage) -> Result<i64> {
    message
        .id
        .parse()
        .map_err(|_| Error::queue(format!("Not a Redpanda message id: {}", message.id)))
}

/// Converts a fetched record into a queue message.
fn to_message(topic: &str, record: RecordAndOffset) -> QueueMessage {
    let mut attributes: BTreeMap<String, String> = record
        .record
        .headers
        .into_iter()
        .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
        .collect();
    attributes.insert("topic".to_string(), topic.to_string());
    attributes.insert("timestamp".to_string(), record.record.timestamp.to_rfc3339());
    if let Some(key) = record.record.key {
        attributes.insert("key".to_string(), String::from_utf8_lossy(&key).into_owned());
    }

    QueueMessage {
        id: record.offset.to_string(),
        body: record.record.value.unwrap_or_default().into(),
        attributes,
    }
}

/// Queue of backup result notifications on one Redpanda partition.
pub struct RedpandaQueue {
    config: RedpandaConfig,
    partition_client: RwLock<Option<Arc<PartitionClient>>>,
    /// `None` until the first connection resolves the start offset.
    offsets: Mutex<Option<OffsetTracker>>,
}

impl RedpandaQueue {
    pub fn new(config: RedpandaConfig) -> Self {
        info!(
            topic = %config.topic,
            brokers = %config.broker_string(),
            "Creating Redpanda backup result queue"
        );

        Self {
            config,
            partition_client: RwLock::new(None),
            offsets: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RedpandaConfig {
        &self.config
    }

    async fn ensure_connected(&self) -> Result<Arc<PartitionClient>> {
        if let Some(ref client) = *self.partition_client.read().await {
            return Ok(client.clone());
        }

        let client = client_builder(&self.config)
            .build()
            .await
            .map_err(|e| Error::queue(format!("Failed to connect to Redpanda: {}", e)))?;

        let partition_client = client
            .partition_client(self.config.topic.clone(), 0, UnknownTopicHandling::Error)
            .await
            .map_err(|e| Error::queue(format!("Failed to get partition client: {}", e)))?;
        let partition_client = Arc::new(partition_client);

        *self.partition_client.write().await = Some(partition_client.clone());
        Ok(partition_client)
    }

    /// Resolves the start offset on first use.
    async fn init_offsets(&self, client: &PartitionClient) -> Result<()> {
        let mut guard = self.offsets.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let at = match self.config.start_offset {
            StartOffset::Earliest => OffsetAt::Earliest,
            StartOffset::Latest => OffsetAt::Latest,
        };
        let start = client
            .get_offset(at)
            .await
            .map_err(|e| Error::queue(format!("Failed to get start offset: {}", e)))?;

        info!(topic = %self.config.topic, partition = 0, offset = start, "Queue initialized at offset");
        *guard = Some(OffsetTracker::new(start));
        Ok(())
    }

    /// First offset not yet acknowledged.
    pub async fn committed_offset(&self) -> Option<i64> {
        self.offsets.lock().await.as_ref().map(OffsetTracker::committed)
    }

    /// Drops the cached connection (for error recovery).
    pub async fn reset_connection(&self) {
        *self.partition_client.write().await = None;
        info!("Redpanda connection reset");
    }
}

#[async_trait]
impl ResultQueue for RedpandaQueue {
    async fn available_backup_results(&self) -> Result<u64> {
        let client = self.ensure_connected().await?;
        self.init_offsets(&client).await?;

        let high_watermark = match client.get_offset(OffsetAt::Latest).await {
            Ok(offset) => offset,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::queue(format!("Failed to get high watermark: {}", e)));
            }
        };

        let guard = self.offsets.lock().await;
        let offsets = guard
            .as_ref()
            .ok_or_else(|| Error::internal("queue offsets not initialized"))?;
        Ok(offsets.available(high_watermark))
    }

    async fn receive_backup_results(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let client = self.ensure_connected().await?;
        self.init_offsets(&client).await?;

        let mut guard = self.offsets.lock().await;
        let Some(offsets) = guard.as_mut() else {
            return Err(Error::internal("queue offsets not initialized"));
        };

        let max_bytes = i32::try_from(self.config.fetch_max_bytes).unwrap_or(i32::MAX);
        let max_wait_ms = i32::try_from(self.config.fetch_max_wait_ms).unwrap_or(i32::MAX);

        let (mut records, high_watermark) = match client
            .fetch_records(offsets.next(), 1..max_bytes, max_wait_ms)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(error = %e, "Fetch error");
                drop(guard);
                self.reset_connection().await;
                return Err(Error::queue(format!("Failed to fetch records: {}", e)));
            }
        };

        // Compressed batches may start before the requested offset; `claim` skips those.
        records.sort_by_key(|r| r.offset);
        let fetched: Vec<i64> = records.iter().map(|r| r.offset).collect();
        let claimed: BTreeSet<i64> = offsets.claim(&fetched, max).into_iter().collect();
        records.retain(|r| claimed.contains(&r.offset));

        debug!(
            claimed = records.len(),
            next_offset = offsets.next(),
            high_watermark = high_watermark,
            "Claimed backup result records"
        );

        let topic = &self.config.topic;
        Ok(records.into_iter().map(|r| to_message(topic, r)).collect())
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<()> {
        let offset = parse_offset(message)?;

        let mut guard = self.offsets.lock().await;
        let offsets = guard
            .as_mut()
            .ok_or_else(|| Error::queue("acknowledge before any message was received"))?;

        offsets.acknowledge(offset);

        debug!(
            offset = offset,
            committed_offset = offsets.committed(),
            "Acknowledged backup result"
        );
        Ok(())
    }

    async fn release(&self, messages: &[QueueMessage]) -> Result<()> {
        let released = messages.iter().map(parse_offset).collect::<Result<Vec<_>>>()?;
        if released.is_empty() {
            return Ok(());
        }

        let mut guard = self.offsets.lock().await;
        let offsets = guard
            .as_mut()
            .ok_or_else(|| Error::queue("release before any message was received"))?;
        for offset in released {
            offsets.release(offset);
        }

        debug!(
            count = messages.len(),
            next_offset = offsets.next(),
            "Released backup results"
        );
        Ok(())
    }
}
