//! Adaptive integration over a fixed set of output times
//!
//! The driver steps with the embedded pair's error control and shortens the
//! step that would cross an output time so that every requested time is hit
//! exactly. Rejected steps are reverted and retried with a smaller timestep.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{EmbeddedRk, ExplicitSolver, IntegrationMethod, Solver, SolverError, SolverStepResult};
use crate::utils::constants::{
    SIM_STEPS_MAX, SIM_TIMESTEP, SIM_TIMESTEP_MAX, SIM_TIMESTEP_MIN, SOL_SCALE_MIN,
    SOL_TOLERANCE_LTE_ABS, SOL_TOLERANCE_LTE_REL,
};

/// Tolerances and step limits for [`integrate`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationOptions {
    pub method: IntegrationMethod,
    pub tol_abs: f64,
    pub tol_rel: f64,
    pub initial_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub max_steps: usize,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::default(),
            tol_abs: SOL_TOLERANCE_LTE_ABS,
            tol_rel: SOL_TOLERANCE_LTE_REL,
            initial_step: SIM_TIMESTEP,
            min_step: SIM_TIMESTEP_MIN,
            max_step: SIM_TIMESTEP_MAX,
            max_steps: SIM_STEPS_MAX,
        }
    }
}

impl IntegrationOptions {
    /// Options with custom local error tolerances
    pub fn with_tolerances(tol_abs: f64, tol_rel: f64) -> Self {
        Self {
            tol_abs,
            tol_rel,
            ..Self::default()
        }
    }
}

/// Integrate `dx/dt = f(x, t)` from `x0` at `t_eval[0]`, returning the state at every `t_eval`
///
/// # Errors
///
/// - `InvalidEvaluationTimes` if `t_eval` is empty or not strictly increasing
/// - `TimestepTooSmall` if error control drives the step below `min_step`
/// - `StepBudgetExhausted` if more than `max_steps` steps are attempted
/// - `NonFiniteState` if the state becomes NaN or infinite
pub fn integrate<F>(
    mut f: F,
    x0: DVector<f64>,
    t_eval: &[f64],
    options: &IntegrationOptions,
) -> Result<Vec<DVector<f64>>, SolverError>
where
    F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
{
    let Some((&t_start, rest)) = t_eval.split_first() else {
        return Err(SolverError::InvalidEvaluationTimes);
    };
    if t_eval.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(SolverError::InvalidEvaluationTimes);
    }

    let mut solver =
        EmbeddedRk::with_tolerances(options.method, x0, options.tol_abs, options.tol_rel);
    let mut samples = Vec::with_capacity(t_eval.len());
    samples.push(solver.state().clone());

    let mut t = t_start;
    let mut dt = options.initial_step.min(options.max_step);
    let mut attempts = 0usize;

    for &t_next in rest {
        while t < t_next {
            let remaining = t_next - t;
            let lands = dt >= remaining;
            let h = if lands { remaining } else { dt };

            attempts += 1;
            if attempts > options.max_steps {
                return Err(SolverError::StepBudgetExhausted {
                    time: t,
                    steps: options.max_steps,
                });
            }

            solver.buffer(h);
            let mut result = SolverStepResult::default();
            for _ in 0..solver.stages() {
                result = solver.step(&mut f, t, h)?;
            }

            let scale = result.scale.unwrap_or(1.0);
            if result.success {
                t = if lands { t_next } else { t + h };
                if solver.state().iter().any(|x| !x.is_finite()) {
                    return Err(SolverError::NonFiniteState { time: t });
                }
                // A step shortened to land on an output time only shrinks dt when the
                // error estimate asks for it
                if !lands {
                    dt = (h * scale).min(options.max_step);
                } else if scale < 1.0 {
                    dt = dt.min(h * scale);
                }
            } else {
                solver.revert()?;
                dt = h * scale.min(1.0).max(SOL_SCALE_MIN);
                if !result.error_norm.is_finite() {
                    dt = h * SOL_SCALE_MIN;
                }
            }

            if dt < options.min_step {
                return Err(SolverError::TimestepTooSmall {
                    time: t,
                    dt,
                    dt_min: options.min_step,
                });
            }
        }
        samples.push(solver.state().clone());
    }

    log::trace!(
        "integrated {} output times with {} attempted steps",
        t_eval.len(),
        attempts
    );

    Ok(samples)
}
