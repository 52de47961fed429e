//! Hello Future World logger
//!
//! The logging facade used by every tutorial script.
//!
//! Provides:
//! - Logger sessions with start/section/complete/error/summary calls
//! - Cross-run stats persisted in a shared JSON file
//! - Funnel analytics over all scripts (time to first task, per-task runs)
//! - Plain or ANSI console banners and blocking operator prompts

pub mod console;
pub mod prompt;
pub mod session;
pub mod summary;

pub use console::{Highlight, Style, HELLIP};
pub use prompt::OperatorInput;
pub use session::{create_logger, LoggerOptions, LoggerSession, SessionState};
pub use summary::{compute_summary, render_summary, SummaryReport};

/// Build stamp: `HFW_VERSION` at build time, else the git revision, else the
/// crate version
pub const VERSION: &str = env!("HFW_BUILD_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::console::Highlight;
    pub use crate::session::{create_logger, LoggerOptions, LoggerSession};
    pub use crate::summary::SummaryReport;
}
