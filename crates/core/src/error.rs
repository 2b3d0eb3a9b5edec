//! Unified error types for backup result ingestion.
//!
//! Three kinds of failure flow through the pipeline:
//! - `ExtractError::NotApplicable`: a metadata strategy does not apply to a payload
//! - `Error::InvalidPayload`: classified terminal failure carrying a machine-readable code
//! - everything else: unclassified failures (unimplemented extension points,
//!   unexpected delivery types, collaborator errors)

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Codes attached to classified payload failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidPayloadCode {
    /// No client record exists for the payload's client id.
    ClientNotFound,
    /// The stored client key differs from the payload's key.
    ClientKeyMismatch,
    /// Email content could not be turned into metrics.
    ExtractMetrics,
    /// The queue message did not yield usable metadata.
    InvalidQueueJson,
}

impl InvalidPayloadCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClientNotFound => "CLIENT_NOT_FOUND",
            Self::ClientKeyMismatch => "CLIENT_KEY_MISMATCH",
            Self::ExtractMetrics => "EXTRACT_METRICS",
            Self::InvalidQueueJson => "INVALID_QUEUE_JSON",
        }
    }
}

impl std::fmt::Display for InvalidPayloadCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A backup payload that was rejected for a classified reason.
///
/// Carries enough context to diagnose the rejection without the original
/// queue message.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message} (ingest {ingest_id})")]
pub struct InvalidBackupPayload {
    pub ingest_id: Uuid,
    pub backup_id: Option<String>,
    pub code: InvalidPayloadCode,
    pub message: String,
    pub context: Map<String, Value>,
}

impl InvalidBackupPayload {
    pub fn new(ingest_id: Uuid, code: InvalidPayloadCode, message: impl Into<String>) -> Self {
        Self {
            ingest_id,
            backup_id: None,
            code,
            message: message.into(),
            context: Map::new(),
        }
    }

    pub fn with_backup_id(mut self, backup_id: impl Into<String>) -> Self {
        self.backup_id = Some(backup_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Failure of a single metadata extraction strategy.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The strategy does not apply to this payload.
    #[error("{0}")]
    NotApplicable(String),

    /// The strategy failed in a way it did not anticipate.
    #[error("unexpected extractor failure: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl ExtractError {
    pub fn not_applicable(msg: impl Into<String>) -> Self {
        Self::NotApplicable(msg.into())
    }

    /// Text recorded for this failure in an extraction aggregate.
    ///
    /// Expected failures contribute their message, unexpected ones the full
    /// error chain.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::NotApplicable(msg) => msg.clone(),
            Self::Unexpected(err) => format!("{:?}", err),
        }
    }
}

/// Unified error type for the ingestion engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Classified payload rejection.
    #[error(transparent)]
    InvalidPayload(Box<InvalidBackupPayload>),

    /// An extension point was used without a concrete implementation.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("unexpected delivery type: {0}")]
    UnexpectedDeliveryType(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<InvalidBackupPayload> for Error {
    fn from(err: InvalidBackupPayload) -> Self {
        Self::InvalidPayload(Box::new(err))
    }
}

impl Error {
    pub fn not_implemented(what: &'static str) -> Self {
        Self::NotImplemented(what)
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the classification code if this is a classified payload error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPayload(err) => Some(err.code.code()),
            _ => None,
        }
    }

    /// Returns the classified payload error, if any.
    pub fn as_invalid_payload(&self) -> Option<&InvalidBackupPayload> {
        match self {
            Self::InvalidPayload(err) => Some(err),
            _ => None,
        }
    }
}
