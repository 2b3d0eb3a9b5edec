//! Tests for the per-message ingestion pipeline.
//!
//! Every collaborator is mocked; assertions are on the recorded calls.

use ingest_core::{
    BackupResultMeta, DeliveryDetails, DeliveryType, Error, InvalidPayloadCode, QueueMessage,
};
use integration_tests::{
    fixtures::{self, CLIENT_ID, CLIENT_KEY},
    setup::TestContext,
};
use uuid::Uuid;

fn meta(delivery_type: DeliveryType) -> BackupResultMeta {
    BackupResultMeta {
        client_id: CLIENT_ID.into(),
        client_key: CLIENT_KEY.into(),
        backup_id: "b-1".into(),
        backup_type: "restic".into(),
        delivery_type,
        details: DeliveryDetails::None,
    }
}

/// Successful email ingest persists once and archives once under the same ingest id
#[tokio::test]
async fn test_email_result_is_persisted_and_archived() {
    let ctx = TestContext::new();
    ctx.storage.put("b-1", fixtures::email_report());
    let ingest_id = Uuid::new_v4();

    let receipt = fixtures::email_receipt(CLIENT_ID, CLIENT_KEY, "restic", "b-1");
    let meta = ctx
        .pipeline
        .ingest_queued_backup_result(ingest_id, &fixtures::message("1", &receipt))
        .await
        .expect("ingest should succeed");

    assert_eq!(meta.delivery_type, DeliveryType::Email);
    assert_eq!(meta.backup_id, "b-1");

    let results = ctx.store.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, meta);

    assert_eq!(ctx.storage.archived(), vec![("b-1".to_string(), ingest_id)]);

    // Email results never reach the HTTP-POST extractor
    assert_eq!(ctx.parser.email_calls(), vec!["restic".to_string()]);
    assert!(ctx.parser.http_post_calls().is_empty());
}

/// HTTP-POST results wrapped in an SNS envelope are unwrapped and ingested
#[tokio::test]
async fn test_enveloped_http_post_result_is_ingested() {
    let ctx = TestContext::new();
    ctx.storage.put("b-2", fixtures::line_report());

    let notification = fixtures::http_post_notification(CLIENT_ID, CLIENT_KEY, "borg", "b-2");
    let envelope = fixtures::sns_envelope(&notification);

    let meta = ctx
        .pipeline
        .ingest_queued_backup_result(Uuid::new_v4(), &fixtures::message("1", &envelope))
        .await
        .expect("ingest should succeed");

    assert_eq!(meta.delivery_type, DeliveryType::HttpPost);
    assert_eq!(ctx.store.result_count(), 1);
    assert_eq!(ctx.parser.http_post_calls(), vec!["borg".to_string()]);
    assert!(ctx.parser.email_calls().is_empty());
}

/// Wrong client key is rejected with CLIENT_KEY_MISMATCH before any content access
#[tokio::test]
async fn test_key_mismatch_is_classified() {
    let ctx = TestContext::new();
    ctx.storage.put("b-1", fixtures::line_report());

    let notification = fixtures::http_post_notification(CLIENT_ID, "WrongKey", "borg", "b-1");
    let err = ctx
        .pipeline
        .ingest_queued_backup_result(Uuid::new_v4(), &fixtures::message("1", &notification))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), Some("CLIENT_KEY_MISMATCH"));
    let rejection = err.as_invalid_payload().unwrap();
    assert_eq!(rejection.backup_id.as_deref(), Some("b-1"));
    assert_eq!(ctx.store.result_count(), 0);
    assert!(ctx.storage.archived().is_empty());
    assert!(ctx.parser.http_post_calls().is_empty());
}

/// Unknown client is rejected with CLIENT_NOT_FOUND
#[tokio::test]
async fn test_unknown_client_is_classified() {
    let ctx = TestContext::new();

    let receipt = fixtures::email_receipt("globex", "Key1", "restic", "b-1");
    let err = ctx
        .pipeline
        .ingest_queued_backup_result(Uuid::new_v4(), &fixtures::message("1", &receipt))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), Some("CLIENT_NOT_FOUND"));
    assert_eq!(ctx.store.result_count(), 0);
}

/// Bodies that are not JSON are rejected with INVALID_QUEUE_JSON
#[tokio::test]
async fn test_invalid_json_is_classified() {
    let ctx = TestContext::new();
    let ingest_id = Uuid::new_v4();

    let err = ctx
        .pipeline
        .ingest_queued_backup_result(ingest_id, &QueueMessage::new("1", "not json"))
        .await
        .unwrap_err();

    let rejection = err.as_invalid_payload().unwrap();
    assert_eq!(rejection.code, InvalidPayloadCode::InvalidQueueJson);
    assert_eq!(rejection.ingest_id, ingest_id);
    assert_eq!(rejection.context["payload"], "not json");
}

/// JSON that no extractor understands names every extractor's diagnostic
#[tokio::test]
async fn test_unrecognised_payload_is_classified() {
    let ctx = TestContext::new();
    let body = serde_json::json!({ "deliveryType": "ftp", "clientId": CLIENT_ID });

    let err = ctx
        .pipeline
        .ingest_queued_backup_result(Uuid::new_v4(), &fixtures::message("1", &body))
        .await
        .unwrap_err();

    let rejection = err.as_invalid_payload().unwrap();
    assert_eq!(rejection.code, InvalidPayloadCode::InvalidQueueJson);
    let errors = rejection.context["errors"].to_string();
    assert!(errors.contains("email"));
    assert!(errors.contains("httppost"));
}

/// A delivery type without a metrics extractor fails unclassified, with no side effects
#[tokio::test]
async fn test_unknown_delivery_type_has_no_side_effects() {
    let ctx = TestContext::new();
    ctx.storage.put("b-1", fixtures::line_report());

    let err = ctx
        .pipeline
        .ingest_backup_result(Uuid::new_v4(), &meta(DeliveryType::Unknown("fax".into())))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnexpectedDeliveryType(ref t) if t == "fax"));
    assert_eq!(err.error_code(), None);
    assert_eq!(ctx.store.result_count(), 0);
    assert!(ctx.storage.archived().is_empty());
    assert!(ctx.parser.email_calls().is_empty());
    assert!(ctx.parser.http_post_calls().is_empty());
}

/// Email metric failures are classified as EXTRACT_METRICS
#[tokio::test]
async fn test_email_parse_failure_is_classified() {
    let ctx = TestContext::new();
    ctx.storage.put("b-1", "garbage");
    ctx.parser.set_should_fail(true);

    let err = ctx
        .pipeline
        .ingest_backup_result(Uuid::new_v4(), &meta(DeliveryType::Email))
        .await
        .unwrap_err();

    let rejection = err.as_invalid_payload().unwrap();
    assert_eq!(rejection.code, InvalidPayloadCode::ExtractMetrics);
    assert_eq!(rejection.context["backupType"], "restic");
    assert_eq!(ctx.store.result_count(), 0);
    assert!(ctx.storage.archived().is_empty());
}

/// HTTP-POST metric failures propagate unclassified
#[tokio::test]
async fn test_http_post_parse_failure_is_unclassified() {
    let ctx = TestContext::new();
    ctx.storage.put("b-1", "garbage");
    ctx.parser.set_should_fail(true);

    let err = ctx
        .pipeline
        .ingest_backup_result(Uuid::new_v4(), &meta(DeliveryType::HttpPost))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(ctx.store.result_count(), 0);
}

/// Archive failure after persist leaves the record and surfaces the error
#[tokio::test]
async fn test_archive_failure_after_persist() {
    let ctx = TestContext::new();
    ctx.storage.put("b-1", fixtures::line_report());
    ctx.storage.set_should_fail_archive(true);

    let err = ctx
        .pipeline
        .ingest_backup_result(Uuid::new_v4(), &meta(DeliveryType::HttpPost))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(ctx.store.result_count(), 1);
}

/// Missing content fails before anything is persisted
#[tokio::test]
async fn test_missing_content_fails_before_persist() {
    let ctx = TestContext::new();

    let err = ctx
        .pipeline
        .ingest_backup_result(Uuid::new_v4(), &meta(DeliveryType::Email))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert!(ctx.parser.email_calls().is_empty());
    assert_eq!(ctx.store.result_count(), 0);
}
