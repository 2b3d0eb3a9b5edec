//! Metadata extraction: an ordered fallback chain of delivery-specific
//! strategies.
//!
//! Each strategy either recognises a payload and returns its metadata, or
//! reports `ExtractError::NotApplicable`. The chain returns the first
//! success; when every strategy fails, their diagnostics are aggregated into
//! one `INVALID_QUEUE_JSON` error.

mod email;
mod http_post;

pub use email::EmailMetaExtractor;
pub use http_post::HttpPostMetaExtractor;

use ingest_core::{
    BackupResultMeta, ExtractError, InvalidBackupPayload, InvalidPayloadCode, Payload, Result,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

/// A delivery-specific metadata extraction strategy.
pub trait MetadataExtractor: Send + Sync {
    /// Key under which this strategy's failure is reported.
    fn name(&self) -> &'static str;

    /// Extracts metadata from a payload.
    ///
    /// Strategies that do not override this report themselves as not
    /// applicable, so an unfinished strategy never breaks the chain.
    fn extract(&self, payload: &Payload) -> std::result::Result<BackupResultMeta, ExtractError> {
        let _ = payload;
        Err(ExtractError::not_applicable("not implemented"))
    }
}

/// Ordered list of strategies; earlier entries take priority.
pub struct MetadataExtractorChain {
    extractors: Vec<Box<dyn MetadataExtractor>>,
}

impl Default for MetadataExtractorChain {
    /// Email first, then HTTP-POST.
    fn default() -> Self {
        Self::new(vec![
            Box::new(EmailMetaExtractor::new()),
            Box::new(HttpPostMetaExtractor::new()),
        ])
    }
}

impl MetadataExtractorChain {
    pub fn new(extractors: Vec<Box<dyn MetadataExtractor>>) -> Self {
        Self { extractors }
    }

    /// Strategy names in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Runs the strategies in order and returns the first success.
    pub fn extract_backup_result_meta(
        &self,
        ingest_id: Uuid,
        payload: &Payload,
    ) -> Result<BackupResultMeta> {
        let mut failures = Map::new();

        for extractor in &self.extractors {
            match extractor.extract(payload) {
                Ok(meta) => {
                    debug!(
                        ingest_id = %ingest_id,
                        extractor = extractor.name(),
                        backup_id = %meta.backup_id,
                        "Extracted backup result metadata"
                    );
                    return Ok(meta);
                }
                Err(err) => {
                    if let ExtractError::Unexpected(ref cause) = err {
                        warn!(
                            ingest_id = %ingest_id,
                            extractor = extractor.name(),
                            error = %cause,
                            "Metadata extractor failed unexpectedly"
                        );
                    } else {
                        debug!(
                            ingest_id = %ingest_id,
                            extractor = extractor.name(),
                            reason = %err,
                            "Metadata extractor not applicable"
                        );
                    }
                    failures.insert(extractor.name().to_string(), Value::String(err.diagnostic()));
                }
            }
        }

        Err(InvalidBackupPayload::new(
            ingest_id,
            InvalidPayloadCode::InvalidQueueJson,
            "no metadata extractor accepted the payload",
        )
        .with_context("payload", payload.as_value().clone())
        .with_context("errors", Value::Object(failures))
        .into())
    }
}
