//! polesim - Pole-placement tuning and step-response characterization
//!
//! Designs PI/PID gains for a first-order heater plant G(s) = k/(τs + 1) so
//! that the closed loop has prescribed poles, simulates the resulting step
//! response and extracts overshoot and settling time.
//!
//! # Architecture
//!
//! - [`gains`]: closed-form pole placement by coefficient matching
//! - [`simulate`]: exact rational step response, or adaptive integration of
//!   the PI loop with explicit integrator state
//! - [`metrics`]: overshoot and last-entry settling time
//! - [`sweep`]: independent per-point evaluation over K_D or ζ
//! - [`telemetry`] and [`persistence`]: device logs to CSV and NPY files
//!
//! # Example
//!
//! ```rust
//! use polesim::prelude::*;
//!
//! let plant = PlantParameters::new(1.0, 1.0)?;
//! let target = TargetPoles::new(4.0, 1.0)?;
//! let gains = solve(&target, &plant, 0.0)?;
//! assert_eq!((gains.kp(), gains.ki()), (7.0, 16.0));
//!
//! let grid = TimeGrid::linspace(0.0, 2.0, 2000)?;
//! let response = step_response_linear(&gains, &plant, &grid)?;
//! let metrics = extract_step_metrics(&response)?;
//! assert!(metrics.settling.time().unwrap() < 2.0);
//! # Ok::<(), polesim::TuningError>(())
//! ```

pub mod config;
pub mod error;
pub mod gains;
pub mod lti;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod poles;
pub mod simulate;
pub mod solvers;
pub mod sweep;
pub mod telemetry;
pub mod utils;

pub use error::{Result, TuningError};
pub use model::{ControllerGains, PlantParameters, TargetPoles};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Backend, DampingSweepConfig, SweepConfig};
    pub use crate::error::{Result, TuningError};
    pub use crate::gains::{pi_gains_for_damping, solve};
    pub use crate::metrics::{extract_metrics, extract_step_metrics, Settling, StepMetrics};
    pub use crate::model::{ControllerGains, PlantParameters, TargetPoles};
    pub use crate::simulate::{
        step_response_integrated, step_response_linear, ClosedLoopModel, TimeGrid, Trajectory,
    };
    pub use crate::sweep::{run_damping_sweep, run_sweep, SweepReport};
}
