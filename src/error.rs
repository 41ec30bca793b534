//! Error types for correction and interest calculations

use thiserror::Error;

use crate::indices::CorrectionIndex;

/// Result alias used across the library
pub type CalcResult<T> = Result<T, CalcError>;

/// Errors raised while loading cases, fetching index series, or calculating
#[derive(Debug, Error)]
pub enum CalcError {
    /// A start date falls after the calculation end date.
    /// The engine recovers from this locally; loaders and callers may still raise it.
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    /// The index data source could not be reached and no cached data covers the request
    #[error("index data source unavailable for {index}: {reason}")]
    DataSourceUnavailable {
        index: CorrectionIndex,
        reason: String,
    },

    /// Input rejected before reaching the engine (missing dates, no claimants, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// A date string could not be parsed
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// A value in an input or response could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CalcError {
    /// Build a data source error from anything displayable
    pub fn unavailable(index: CorrectionIndex, reason: impl std::fmt::Display) -> Self {
        CalcError::DataSourceUnavailable {
            index,
            reason: reason.to_string(),
        }
    }

    /// Whether this error came from the data source (and a stale cache may cover it)
    pub fn is_data_source(&self) -> bool {
        matches!(self, CalcError::DataSourceUnavailable { .. })
    }
}
