//! Backup result content storage.

pub mod config;
pub mod local;

pub use config::*;
pub use local::LocalContentStorage;
