//! Error handling for fundrecon
//!
//! Defines custom error types and establishes a unified Result type
//! using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for reconciliation and performance reporting
#[derive(Error, Debug)]
pub enum ReportError {
    /// A computation was invoked on an empty input table. Surfaced loudly so
    /// a load-order bug is visible instead of a silently empty report file.
    #[error("empty data: {0}")]
    EmptyData(String),

    /// An input table is missing an expected column, distinct from generic
    /// computation failures so callers can tell data-shape problems apart
    /// from logic bugs.
    #[error("schema mismatch in {source_name}: missing expected column '{column}'")]
    SchemaMismatch { source_name: String, column: String },

    #[error("database error: {0}")]
    DbError(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for reporting operations
pub type Result<T> = anyhow::Result<T>;
