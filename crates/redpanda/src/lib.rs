//! Redpanda-backed backup result queue.

pub mod config;
pub mod health;
pub mod offsets;
pub mod queue;

pub use config::*;
pub use offsets::OffsetTracker;
pub use queue::RedpandaQueue;
