//! Metadata from backup results posted over HTTP.

use ingest_core::{BackupResultMeta, DeliveryDetails, DeliveryType, ExtractError, Payload};
use serde::Deserialize;

use super::MetadataExtractor;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpPostNotification {
    client_id: String,
    client_key: String,
    backup_id: String,
    backup_type: String,
    remote_addr: Option<String>,
    user_agent: Option<String>,
}

/// Extracts metadata from notifications published by the HTTP receiver.
#[derive(Debug, Default, Clone)]
pub struct HttpPostMetaExtractor;

impl HttpPostMetaExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataExtractor for HttpPostMetaExtractor {
    fn name(&self) -> &'static str {
        "httppost"
    }

    fn extract(&self, payload: &Payload) -> Result<BackupResultMeta, ExtractError> {
        match payload.str_field("deliveryType") {
            Some("httppost") => {}
            Some(other) => {
                return Err(ExtractError::not_applicable(format!(
                    "delivery type is {}, not httppost",
                    other
                )))
            }
            None => return Err(ExtractError::not_applicable("payload has no deliveryType")),
        }

        let notification: HttpPostNotification = serde_json::from_value(payload.as_value().clone())
            .map_err(|e| ExtractError::not_applicable(format!("malformed httppost notification: {}", e)))?;

        let required = [
            ("clientId", &notification.client_id),
            ("clientKey", &notification.client_key),
            ("backupId", &notification.backup_id),
            ("backupType", &notification.backup_type),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ExtractError::not_applicable(format!("{} is empty", field)));
        }

        Ok(BackupResultMeta {
            client_id: notification.client_id,
            client_key: notification.client_key,
            backup_id: notification.backup_id,
            backup_type: notification.backup_type,
            delivery_type: DeliveryType::HttpPost,
            details: DeliveryDetails::HttpPost {
                remote_addr: notification.remote_addr,
                user_agent: notification.user_agent,
            },
        })
    }
}
