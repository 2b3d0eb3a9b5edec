//! Conversion of raw queue messages into delivery-agnostic payloads.

use async_trait::async_trait;
use ingest_core::{Error, InvalidBackupPayload, InvalidPayloadCode, Payload, QueueMessage, Result};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

/// Extracts the payload carried by a queue message.
///
/// Implementors that do not override the method fail with
/// [`Error::NotImplemented`].
#[async_trait]
pub trait PayloadExtractor: Send + Sync {
    async fn extract_queue_message_payload(
        &self,
        ingest_id: Uuid,
        message: &QueueMessage,
    ) -> Result<Payload> {
        let _ = (ingest_id, message);
        Err(Error::not_implemented("extract_queue_message_payload"))
    }
}

/// Parses JSON message bodies, unwrapping SNS-style notification envelopes.
#[derive(Debug, Default, Clone)]
pub struct JsonPayloadExtractor;

impl JsonPayloadExtractor {
    pub fn new() -> Self {
        Self
    }

    fn invalid_json(ingest_id: Uuid, raw: &str, err: &serde_json::Error) -> Error {
        InvalidBackupPayload::new(
            ingest_id,
            InvalidPayloadCode::InvalidQueueJson,
            "queue message is not valid JSON",
        )
        .with_context("payload", raw)
        .with_context("error", err.to_string())
        .into()
    }
}

/// Returns the wrapped message of an SNS notification envelope.
fn envelope_message(value: &Value) -> Option<&str> {
    let is_notification = value.get("Type").and_then(Value::as_str) == Some("Notification");
    if !is_notification {
        return None;
    }
    value.get("Message").and_then(Value::as_str)
}

#[async_trait]
impl PayloadExtractor for JsonPayloadExtractor {
    async fn extract_queue_message_payload(
        &self,
        ingest_id: Uuid,
        message: &QueueMessage,
    ) -> Result<Payload> {
        let raw = message.body_text();
        let outer: Value =
            serde_json::from_str(&raw).map_err(|e| Self::invalid_json(ingest_id, &raw, &e))?;

        let Some(inner) = envelope_message(&outer) else {
            return Ok(Payload::new(outer));
        };

        trace!(ingest_id = %ingest_id, message_id = %message.id, "Unwrapping notification envelope");
        let value: Value =
            serde_json::from_str(inner).map_err(|e| Self::invalid_json(ingest_id, inner, &e))?;
        Ok(Payload::new(value))
    }
}
