//! Session export utilities.
//!
//! Renders [`ChatSession`](strata_core::ChatSession)s as JSON, CSV, or
//! plain text, and computes per-session statistics embedded in the JSON
//! envelope.

pub mod exporter;
pub mod format;
pub mod stats;

pub use exporter::{export_session, SessionExport};
pub use format::ExportFormat;
pub use stats::{compute_statistics, SessionStatistics};
