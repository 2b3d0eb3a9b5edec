//! Backup result store on ClickHouse.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use ingest_core::{BackupMetrics, BackupResultMeta, BackupResultStore, Client, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ClickHouseClient;
use crate::schema::{BACKUP_RESULTS_TABLE, CLIENTS_TABLE};

/// Row of the clients table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ClientRow {
    pub client_id: String,
    pub client_key: String,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            client_id: row.client_id,
            client_key: row.client_key,
        }
    }
}

impl From<&Client> for ClientRow {
    fn from(client: &Client) -> Self {
        ClientRow {
            client_id: client.client_id.clone(),
            client_key: client.client_key.clone(),
        }
    }
}

/// Row of the backup results table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct BackupResultRow {
    pub client_id: String,
    pub backup_id: String,
    pub backup_type: String,
    pub delivery_type: String,
    pub status: String,
    pub started_at: Option<i64>, // milliseconds since epoch
    pub finished_at: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<u64>,
    pub file_count: Option<u64>,
    pub error_count: Option<u64>,
    pub message: Option<String>,
    pub details: String,
    pub received_at: i64,
}

impl BackupResultRow {
    pub fn new(
        meta: &BackupResultMeta,
        metrics: &BackupMetrics,
        received_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            client_id: meta.client_id.clone(),
            backup_id: meta.backup_id.clone(),
            backup_type: meta.backup_type.clone(),
            delivery_type: meta.delivery_type.to_string(),
            status: metrics.status.as_str().to_string(),
            started_at: metrics.started_at.map(|t| t.timestamp_millis()),
            finished_at: metrics.finished_at.map(|t| t.timestamp_millis()),
            duration_seconds: metrics.effective_duration_seconds(),
            size_bytes: metrics.size_bytes,
            file_count: metrics.file_count,
            error_count: metrics.error_count,
            message: metrics.message.clone(),
            details: serde_json::to_string(&meta.details)?,
            received_at: received_at.timestamp_millis(),
        })
    }
}

/// Client lookups and backup result persistence.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: ClickHouseClient,
}

impl ClickHouseStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }
}

#[async_trait]
impl BackupResultStore for ClickHouseStore {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let sql = format!(
            "SELECT ?fields FROM {} FINAL WHERE client_id = ? LIMIT 1",
            self.client.table(CLIENTS_TABLE)
        );

        let row = self
            .client
            .inner()
            .query(&sql)
            .bind(client_id)
            .fetch_optional::<ClientRow>()
            .await
            .map_err(|e| Error::database(format!("Client lookup error: {}", e)))?;

        Ok(row.map(Client::from))
    }

    async fn add_backup_result(
        &self,
        meta: &BackupResultMeta,
        metrics: &BackupMetrics,
    ) -> Result<()> {
        let start = Instant::now();
        let row = BackupResultRow::new(meta, metrics, Utc::now())?;

        let mut insert = self
            .client
            .inner()
            .insert::<BackupResultRow>(&self.client.table(BACKUP_RESULTS_TABLE))
            .map_err(|e| Error::database(format!("Insert error: {}", e)))?;

        insert
            .write(&row)
            .await
            .map_err(|e| Error::database(format!("Write error: {}", e)))?;

        insert
            .end()
            .await
            .map_err(|e| Error::database(format!("End error: {}", e)))?;

        debug!(
            client_id = %meta.client_id,
            backup_id = %meta.backup_id,
            latency_ms = %start.elapsed().as_millis(),
            "Inserted backup result to ClickHouse"
        );
        Ok(())
    }
}
