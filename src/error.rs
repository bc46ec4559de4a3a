//! Crate-level error type
//!
//! Every failure is local to the computation that raised it. A sweep stores
//! one `Result` per point, so a `TuningError` never aborts the other points.

use thiserror::Error;

use crate::solvers::SolverError;

/// Errors raised while designing gains, simulating, or persisting results
#[derive(Error, Debug)]
pub enum TuningError {
    /// A parameter is outside its physical domain (negative K_D, τ ≤ 0, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The configuration cannot be actuated (plant gain k = 0)
    #[error("Degenerate configuration: {0}")]
    DegenerateConfiguration(String),

    /// The integrator could not hold its tolerance over the horizon
    #[error("Numerical divergence at t={time}: {source}")]
    NumericalDivergence {
        time: f64,
        #[source]
        source: SolverError,
    },

    /// A sweep worker thread panicked
    #[error("Sweep worker panicked while evaluating {0}")]
    WorkerPanicked(f64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl TuningError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TuningError::InvalidInput(message.into())
    }
}

impl From<SolverError> for TuningError {
    fn from(source: SolverError) -> Self {
        let time = source.time().unwrap_or(f64::NAN);
        TuningError::NumericalDivergence { time, source }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, TuningError>;
