//! Backtest error taxonomy.
//!
//! Only structurally invalid requests and data-source failures are errors.
//! Short histories and degenerate math are absorbed by the metrics engine and
//! never surface here.

use thiserror::Error;

use crate::nav::NavSourceError;

/// Result alias for backtest operations.
pub type BacktestResult<T> = std::result::Result<T, BacktestError>;

/// Errors surfaced to callers before or instead of a simulation.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Caller-supplied value outside its allowed domain
    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    /// No generator registered under this id
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// The NAV source failed for a reason other than missing data
    #[error("NAV data source error: {0}")]
    DataSource(#[from] NavSourceError),

    /// Parallel worker failed to complete
    #[error("Backtest worker failed: {0}")]
    Worker(String),
}

impl BacktestError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can fix this by changing the request.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. } | Self::UnknownStrategy(_))
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidParameter { .. } | Self::UnknownStrategy(_) => 400,
            Self::DataSource(_) => 502,
            Self::Worker(_) => 500,
        }
    }
}
