//! Tracing setup and in-process counters for backup result ingestion.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
