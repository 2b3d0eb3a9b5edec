//! Backup result metadata and client identity types.

use serde::{Deserialize, Serialize};

/// Channel through which a backup result was delivered.
///
/// Strategies in this crate only ever produce `Email` or `HttpPost`.
/// `Unknown` keeps values from other producers representable so the
/// pipeline can reject them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryType {
    Email,
    HttpPost,
    Unknown(String),
}

impl DeliveryType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::HttpPost => "httppost",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for DeliveryType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "email" => Self::Email,
            "httppost" => Self::HttpPost,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for DeliveryType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<DeliveryType> for String {
    fn from(value: DeliveryType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields only present for one delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryDetails {
    Email {
        from: Option<String>,
        subject: Option<String>,
        message_id: Option<String>,
    },
    HttpPost {
        remote_addr: Option<String>,
        user_agent: Option<String>,
    },
    None,
}

/// Structured metadata extracted from a queued notification.
///
/// Built once per ingest call and never mutated; persisted only together
/// with the metrics parsed from the stored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResultMeta {
    pub client_id: String,
    pub client_key: String,
    pub backup_id: String,
    pub backup_type: String,
    pub delivery_type: DeliveryType,
    pub details: DeliveryDetails,
}

/// Identity record of a backup client, restricted to the fields needed for
/// verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub client_id: String,
    pub client_key: String,
}

impl Client {
    /// Checks a presented key against the stored one.
    pub fn key_matches(&self, presented: &str) -> bool {
        self.client_key == presented
    }
}
