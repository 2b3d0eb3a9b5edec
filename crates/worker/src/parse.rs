//! Backup report parsing.
//!
//! Reports are either a JSON object or `Key: value` lines, e.g.
//!
//! ```text
//! Status: success
//! Started: 2024-05-01T02:00:00Z
//! Size: 1048576
//! Files: 312
//! ```
//!
//! Email deliveries wrap the report in an RFC 5322 message; HTTP-POST
//! deliveries store the request body as-is.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use ingest_core::{BackupMetrics, BackupStatus, Error, MetricsParser, Result};
use mail_parser::MessageParser;
use serde_json::Value;
use tracing::trace;

/// Report field a key maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Status,
    Started,
    Finished,
    Duration,
    Size,
    Files,
    Errors,
    Message,
}

impl Field {
    /// Case, spaces, dashes and underscores are ignored.
    fn from_key(key: &str) -> Option<Self> {
        let key: String = key
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "status" | "result" | "outcome" => Some(Self::Status),
            "started" | "start" | "starttime" | "startedat" => Some(Self::Started),
            "finished" | "end" | "endtime" | "finishedat" | "completedat" => Some(Self::Finished),
            "duration" | "durationseconds" | "elapsed" => Some(Self::Duration),
            "size" | "bytes" | "sizebytes" | "totalsize" => Some(Self::Size),
            "files" | "filecount" | "totalfiles" => Some(Self::Files),
            "errors" | "errorcount" => Some(Self::Errors),
            "message" | "summary" => Some(Self::Message),
            _ => None,
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

fn parse_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .trim_end_matches('s')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

fn parse_count(value: &str) -> Option<u64> {
    value.trim().replace(',', "").parse().ok()
}

fn invalid_value(backup_type: &str, key: &str, value: &str) -> Error {
    Error::parse(format!(
        "invalid value {:?} for {} in {} report",
        value.trim(),
        key,
        backup_type
    ))
}

/// Accumulates recognised fields of one report.
struct ReportBuilder<'a> {
    backup_type: &'a str,
    metrics: BackupMetrics,
    recognised: usize,
}

impl<'a> ReportBuilder<'a> {
    fn new(backup_type: &'a str) -> Self {
        Self {
            backup_type,
            metrics: BackupMetrics::with_status(BackupStatus::Unknown),
            recognised: 0,
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let Some(field) = Field::from_key(key) else {
            return Ok(());
        };

        let backup_type = self.backup_type;
        let invalid = || invalid_value(backup_type, key, value);
        let m = &mut self.metrics;
        match field {
            Field::Status => m.status = BackupStatus::from_report(value),
            Field::Started => m.started_at = Some(parse_timestamp(value).ok_or_else(invalid)?),
            Field::Finished => m.finished_at = Some(parse_timestamp(value).ok_or_else(invalid)?),
            Field::Duration => m.duration_seconds = Some(parse_seconds(value).ok_or_else(invalid)?),
            Field::Size => m.size_bytes = Some(parse_count(value).ok_or_else(invalid)?),
            Field::Files => m.file_count = Some(parse_count(value).ok_or_else(invalid)?),
            Field::Errors => m.error_count = Some(parse_count(value).ok_or_else(invalid)?),
            Field::Message => m.message = Some(value.trim().to_string()),
        }
        self.recognised += 1;
        Ok(())
    }

    fn finish(self) -> Result<BackupMetrics> {
        if self.recognised == 0 {
            return Err(Error::parse(format!(
                "no recognised fields in {} report",
                self.backup_type
            )));
        }
        Ok(self.metrics)
    }
}

/// Parses backup reports into metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportParser;

impl ReportParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses report text in either supported layout.
    pub fn parse_report(backup_type: &str, text: &str) -> Result<BackupMetrics> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::parse(format!("empty {} report", backup_type)));
        }

        let mut builder = ReportBuilder::new(backup_type);

        if text.starts_with('{') {
            let fields: serde_json::Map<String, Value> = serde_json::from_str(text)
                .map_err(|e| Error::parse(format!("invalid JSON {} report: {}", backup_type, e)))?;
            for (key, value) in &fields {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                builder.set(key, &value)?;
            }
        } else {
            for line in text.lines() {
                let Some((key, value)) = line.split_once(':').or_else(|| line.split_once('=')) else {
                    continue;
                };
                builder.set(key.trim(), value)?;
            }
        }

        builder.finish()
    }
}

#[async_trait]
impl MetricsParser for ReportParser {
    async fn extract_email_metrics(&self, backup_type: &str, content: &[u8]) -> Result<BackupMetrics> {
        let message = MessageParser::default()
            .parse(content)
            .ok_or_else(|| Error::parse("content is not a mail message"))?;

        let body = message
            .body_text(0)
            .ok_or_else(|| Error::parse("mail message has no text body"))?;
        trace!(backup_type = backup_type, len = body.len(), "Parsing emailed report");

        Self::parse_report(backup_type, &body)
    }

    async fn extract_http_post_metrics(
        &self,
        backup_type: &str,
        content: &[u8],
    ) -> Result<BackupMetrics> {
        let body = std::str::from_utf8(content)
            .map_err(|e| Error::parse(format!("posted report is not UTF-8: {}", e)))?;
        trace!(backup_type = backup_type, len = body.len(), "Parsing posted report");

        Self::parse_report(backup_type, body)
    }
}
