//! Hello Future World logger core
//!
//! Core types and error handling shared across the logger crates.
//!
//! This crate provides:
//! - Per-script statistics with monotonic first/last timestamps
//! - Telemetry event shape and validation
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{now_millis, EventCategory, MetricsEvent, ScriptCategory, ScriptId, ScriptStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{EventCategory, MetricsEvent, ScriptCategory, ScriptId, ScriptStats};
}
