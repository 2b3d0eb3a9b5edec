//! Core types, collaborator traits, and error taxonomy for backup result ingestion.

pub mod config;
pub mod error;
pub mod message;
pub mod meta;
pub mod ports;
pub mod report;

pub use config::*;
pub use error::{Error, ExtractError, InvalidBackupPayload, InvalidPayloadCode, Result};
pub use message::*;
pub use meta::*;
pub use ports::*;
pub use report::*;
