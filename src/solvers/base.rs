//! Base solver traits and types

use nalgebra::DVector;
use thiserror::Error;

/// Solver-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Timestep {dt} smaller than minimum {dt_min} at t={time}")]
    TimestepTooSmall { time: f64, dt: f64, dt_min: f64 },

    #[error("Step budget of {steps} exhausted at t={time}")]
    StepBudgetExhausted { time: f64, steps: usize },

    #[error("State became non-finite at t={time}")]
    NonFiniteState { time: f64 },

    #[error("History buffer is empty")]
    EmptyHistory,

    #[error("Evaluation times must be non-empty and strictly increasing")]
    InvalidEvaluationTimes,
}

impl SolverError {
    /// Simulation time at which the failure happened, when known
    pub fn time(&self) -> Option<f64> {
        match self {
            SolverError::TimestepTooSmall { time, .. }
            | SolverError::StepBudgetExhausted { time, .. }
            | SolverError::NonFiniteState { time } => Some(*time),
            SolverError::EmptyHistory | SolverError::InvalidEvaluationTimes => None,
        }
    }
}

/// Result of a solver step
#[derive(Debug, Clone, Copy)]
pub struct SolverStepResult {
    pub success: bool,
    pub error_norm: f64,
    pub scale: Option<f64>,
}

impl Default for SolverStepResult {
    fn default() -> Self {
        Self {
            success: true,
            error_norm: 0.0,
            scale: None,
        }
    }
}

/// Core solver trait for numerical integration
pub trait Solver {
    /// Get current state vector
    fn state(&self) -> &DVector<f64>;

    /// Buffer current state for potential reversion
    fn buffer(&mut self, dt: f64);

    /// Revert to buffered state
    fn revert(&mut self) -> Result<(), SolverError>;

    /// Reset solver to initial state
    fn reset(&mut self);

    /// Order of the propagating method
    fn order(&self) -> usize;

    /// Number of stages
    fn stages(&self) -> usize;

    /// Is this an adaptive solver?
    fn is_adaptive(&self) -> bool;
}

/// Explicit solver trait
///
/// One call evaluates one stage; a full step is `stages()` calls after
/// `buffer()`. The last call returns the error estimate.
pub trait ExplicitSolver: Solver {
    /// Evaluate the next stage of the step `[t, t + dt]`
    fn step<F>(&mut self, f: F, t: f64, dt: f64) -> Result<SolverStepResult, SolverError>
    where
        F: FnMut(&DVector<f64>, f64) -> DVector<f64>;
}
