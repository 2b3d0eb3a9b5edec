//! Metadata from email-delivered backup results.
//!
//! The inbound mail service stores the message and publishes a receipt
//! notification. The recipient local part identifies the client:
//! `<clientId>.<clientKey>.<backupType>@<domain>`.

use std::sync::LazyLock;

use ingest_core::{BackupResultMeta, DeliveryDetails, DeliveryType, ExtractError, Payload};
use regex::Regex;
use serde::Deserialize;

use super::MetadataExtractor;

static RECIPIENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<client_id>[A-Za-z0-9_-]+)\.(?P<client_key>[A-Za-z0-9]+)\.(?P<backup_type>[A-Za-z0-9_-]+)@(?P<domain>[A-Za-z0-9.-]+)$",
    )
    .expect("invalid recipient pattern")
});

#[derive(Debug, Deserialize)]
struct ReceiptNotification {
    mail: MailObject,
    #[serde(default)]
    receipt: Option<Receipt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MailObject {
    message_id: Option<String>,
    source: Option<String>,
    #[serde(default)]
    destination: Vec<String>,
    common_headers: Option<CommonHeaders>,
}

#[derive(Debug, Deserialize)]
struct CommonHeaders {
    subject: Option<String>,
    #[serde(default)]
    from: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Receipt {
    #[serde(default)]
    recipients: Vec<String>,
    action: Option<ReceiptAction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptAction {
    object_key: Option<String>,
}

/// Client identity encoded in a recipient address.
#[derive(Debug, PartialEq, Eq)]
struct RecipientIdentity {
    client_id: String,
    client_key: String,
    backup_type: String,
    domain: String,
}

/// Strips a display name: `"Backups <a@b>"` becomes `a@b`.
fn bare_address(addr: &str) -> &str {
    let addr = addr.trim();
    match (addr.rfind('<'), addr.rfind('>')) {
        (Some(start), Some(end)) if start < end => &addr[start + 1..end],
        _ => addr,
    }
}

fn parse_recipient(addr: &str) -> Option<RecipientIdentity> {
    let caps = RECIPIENT_REGEX.captures(bare_address(addr))?;
    Some(RecipientIdentity {
        client_id: caps["client_id"].to_string(),
        client_key: caps["client_key"].to_string(),
        backup_type: caps["backup_type"].to_string(),
        domain: caps["domain"].to_lowercase(),
    })
}

/// Extracts metadata from inbound mail receipt notifications.
#[derive(Debug, Default, Clone)]
pub struct EmailMetaExtractor {
    /// Only recipients at this domain are considered, when set.
    domain: Option<String>,
}

impl EmailMetaExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into().to_lowercase()),
        }
    }

    fn accepts(&self, identity: &RecipientIdentity) -> bool {
        self.domain
            .as_deref()
            .map_or(true, |domain| identity.domain == domain)
    }
}

impl MetadataExtractor for EmailMetaExtractor {
    fn name(&self) -> &'static str {
        "email"
    }

    fn extract(&self, payload: &Payload) -> Result<BackupResultMeta, ExtractError> {
        if payload.as_value().get("mail").is_none() {
            return Err(ExtractError::not_applicable("payload has no mail object"));
        }

        let notification: ReceiptNotification = serde_json::from_value(payload.as_value().clone())
            .map_err(|e| ExtractError::not_applicable(format!("malformed mail notification: {}", e)))?;

        let receipt = notification.receipt.as_ref();
        let recipients = receipt
            .map(|r| r.recipients.iter())
            .into_iter()
            .flatten()
            .chain(notification.mail.destination.iter());

        let identity = recipients
            .filter_map(|addr| parse_recipient(addr))
            .find(|identity| self.accepts(identity))
            .ok_or_else(|| ExtractError::not_applicable("no recipient addresses a backup client"))?;

        // Object keys may carry a storage prefix; content is addressed by the last segment.
        let backup_id = receipt
            .and_then(|r| r.action.as_ref())
            .and_then(|a| a.object_key.as_deref())
            .and_then(|key| key.rsplit('/').next())
            .filter(|id| !id.is_empty())
            .or(notification.mail.message_id.as_deref())
            .ok_or_else(|| ExtractError::not_applicable("mail notification has no backup id"))?
            .to_string();

        let headers = notification.mail.common_headers.as_ref();
        let from = headers
            .and_then(|h| h.from.first().cloned())
            .or_else(|| notification.mail.source.clone());

        Ok(BackupResultMeta {
            client_id: identity.client_id,
            client_key: identity.client_key,
            backup_id,
            backup_type: identity.backup_type,
            delivery_type: DeliveryType::Email,
            details: DeliveryDetails::Email {
                from,
                subject: headers.and_then(|h| h.subject.clone()),
                message_id: notification.mail.message_id.clone(),
            },
        })
    }
}
