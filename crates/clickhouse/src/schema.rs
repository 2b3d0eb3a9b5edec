//! ClickHouse table schemas.
//!
//! - `clients`: one row per backup client, replaced on key rotation
//! - `backup_results`: one row per ingested result

use crate::client::ClickHouseClient;
use ingest_core::{Error, Result};

pub const CLIENTS_TABLE: &str = "clients";
pub const BACKUP_RESULTS_TABLE: &str = "backup_results";

/// SQL for creating the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {database}")
}

/// SQL for creating the clients table.
pub fn create_clients_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{CLIENTS_TABLE} (
    client_id String,
    client_key String,
    updated_at DateTime DEFAULT now()
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY client_id
"#
    )
}

/// SQL for creating the backup results table.
///
/// Timestamps are milliseconds since epoch.
pub fn create_backup_results_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{BACKUP_RESULTS_TABLE} (
    client_id String,
    backup_id String,
    backup_type LowCardinality(String),
    delivery_type LowCardinality(String),
    status LowCardinality(String),

    started_at Nullable(DateTime64(3)),
    finished_at Nullable(DateTime64(3)),
    duration_seconds Nullable(Float64),
    size_bytes Nullable(UInt64),
    file_count Nullable(UInt64),
    error_count Nullable(UInt64),
    message Nullable(String),

    -- Delivery channel details as JSON
    details String,

    received_at DateTime64(3)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(received_at)
ORDER BY (client_id, received_at, backup_id)
"#
    )
}

/// All statements, database first.
pub fn all_tables(database: &str) -> Vec<String> {
    vec![
        create_database(database),
        create_clients_table(database),
        create_backup_results_table(database),
    ]
}

/// Initialize the database schema.
///
/// Creates the database and all tables if they don't exist.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    for sql in all_tables(client.database()) {
        client
            .inner()
            .query(&sql)
            .execute()
            .await
            .map_err(|e| Error::database(format!("Schema init error: {}", e)))?;
    }
    Ok(())
}
