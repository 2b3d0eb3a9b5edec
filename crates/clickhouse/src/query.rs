//! Query functions for reading data back (used in tests and admin).

use crate::client::ClickHouseClient;
use crate::schema::{BACKUP_RESULTS_TABLE, CLIENTS_TABLE};
use crate::store::{BackupResultRow, ClientRow};
use ingest_core::{Client, Error, Result};

/// Registers a client, replacing the key of an existing one.
pub async fn upsert_client(client: &ClickHouseClient, record: &Client) -> Result<()> {
    let mut insert = client
        .inner()
        .insert::<ClientRow>(&client.table(CLIENTS_TABLE))
        .map_err(|e| Error::database(format!("Insert error: {}", e)))?;

    insert
        .write(&ClientRow::from(record))
        .await
        .map_err(|e| Error::database(format!("Write error: {}", e)))?;
    insert
        .end()
        .await
        .map_err(|e| Error::database(format!("End error: {}", e)))?;
    Ok(())
}

/// Count backup results for a client.
pub async fn count_backup_results(client: &ClickHouseClient, client_id: &str) -> Result<u64> {
    let sql = format!(
        "SELECT count() FROM {} WHERE client_id = ?",
        client.table(BACKUP_RESULTS_TABLE)
    );
    let count: u64 = client
        .inner()
        .query(&sql)
        .bind(client_id)
        .fetch_one()
        .await
        .map_err(|e| Error::database(format!("Query error: {}", e)))?;
    Ok(count)
}

/// Fetch the most recent backup results for a client.
pub async fn query_backup_results(
    client: &ClickHouseClient,
    client_id: &str,
    limit: u32,
) -> Result<Vec<BackupResultRow>> {
    let sql = format!(
        "SELECT ?fields FROM {} WHERE client_id = ? ORDER BY received_at DESC LIMIT ?",
        client.table(BACKUP_RESULTS_TABLE)
    );
    let rows = client
        .inner()
        .query(&sql)
        .bind(client_id)
        .bind(limit)
        .fetch_all::<BackupResultRow>()
        .await
        .map_err(|e| Error::database(format!("Query error: {}", e)))?;
    Ok(rows)
}

/// Empty both tables (test cleanup).
pub async fn truncate_all(client: &ClickHouseClient) -> Result<()> {
    for table in [CLIENTS_TABLE, BACKUP_RESULTS_TABLE] {
        client
            .inner()
            .query(&format!("TRUNCATE TABLE IF EXISTS {}", client.table(table)))
            .execute()
            .await
            .map_err(|e| Error::database(format!("Truncate error: {}", e)))?;
    }
    Ok(())
}
