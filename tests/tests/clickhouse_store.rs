//! Tests for the ClickHouse backup result store.
//!
//! Requires Docker to be running for the ClickHouse testcontainer.

use clickhouse_client::{
    count_backup_results, query_backup_results, schema::init_schema, truncate_all, upsert_client,
    ClickHouseClient, ClickHouseStore,
};
use ingest_core::{
    BackupMetrics, BackupResultMeta, BackupResultStore, BackupStatus, Client, DeliveryDetails,
    DeliveryType,
};
use integration_tests::containers::TestContainers;

async fn store() -> (TestContainers, ClickHouseClient) {
    let containers = TestContainers::start().await;
    let client = ClickHouseClient::new(containers.clickhouse_config());
    init_schema(&client).await.expect("Failed to initialize schema");
    truncate_all(&client).await.expect("Failed to truncate tables");
    (containers, client)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_client_lookup() {
    let (_containers, client) = store().await;
    upsert_client(
        &client,
        &Client {
            client_id: "acme".into(),
            client_key: "S3cr3tK3y".into(),
        },
    )
    .await
    .unwrap();

    let store = ClickHouseStore::new(client);
    let found = store.get_client("acme").await.unwrap().unwrap();
    assert!(found.key_matches("S3cr3tK3y"));
    assert!(store.get_client("globex").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_add_backup_result() {
    let (_containers, client) = store().await;
    let store = ClickHouseStore::new(client.clone());

    let meta = BackupResultMeta {
        client_id: "acme".into(),
        client_key: "S3cr3tK3y".into(),
        backup_id: "b-1".into(),
        backup_type: "restic".into(),
        delivery_type: DeliveryType::HttpPost,
        details: DeliveryDetails::HttpPost {
            remote_addr: Some("203.0.113.7".into()),
            user_agent: None,
        },
    };
    let metrics = BackupMetrics {
        size_bytes: Some(1024),
        ..BackupMetrics::with_status(BackupStatus::Success)
    };

    store.add_backup_result(&meta, &metrics).await.unwrap();

    assert_eq!(count_backup_results(&client, "acme").await.unwrap(), 1);
    let rows = query_backup_results(&client, "acme", 10).await.unwrap();
    assert_eq!(rows[0].backup_id, "b-1");
    assert_eq!(rows[0].delivery_type, "httppost");
    assert_eq!(rows[0].status, "success");
    assert_eq!(rows[0].size_bytes, Some(1024));
}
