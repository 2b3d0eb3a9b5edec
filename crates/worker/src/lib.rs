//! Queue consumption and ingestion of backup result notifications.
//!
//! - Coordinator (sizes and launches workers per cycle)
//! - Queue worker (drains messages through the pipeline)
//! - Pipeline (payload → metadata → client → content → metrics → persist → archive)
//! - Metadata extractor chain (email, HTTP-POST)
//! - Report parser
//! - Scheduler (runs cycles on an interval)

pub mod consumer;
pub mod context;
pub mod coordinator;
pub mod extractors;
pub mod invoker;
pub mod parse;
pub mod payload;
pub mod pipeline;
pub mod scheduler;

pub use consumer::{DrainReport, QueueWorker};
pub use context::IngestContext;
pub use coordinator::{plan_workers, ConsumerRunSummary, QueueConsumer, WorkerPlan};
pub use extractors::{EmailMetaExtractor, HttpPostMetaExtractor, MetadataExtractor, MetadataExtractorChain};
pub use invoker::{InProcessInvoker, UnconfiguredInvoker, WorkerInvoker};
pub use parse::ReportParser;
pub use payload::{JsonPayloadExtractor, PayloadExtractor};
pub use pipeline::IngestionPipeline;
pub use scheduler::ConsumerScheduler;
