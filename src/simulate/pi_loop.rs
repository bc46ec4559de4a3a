//! PI(D) loop integrated as an explicit ODE
//!
//! State x = [y, z] with y the plant output and z the integral of the error.
//! The derivative acts on the measurement, u = K_P·e + K_I·z − K_D·dy/dt,
//! which folds into the plant's leading coefficient:
//!
//! ```text
//!   e = r − y
//!   dy/dt = (−y + k·(K_P·e + K_I·z)) / (τ + k·K_D)
//!   dz/dt = e
//! ```
//!
//! With a saturation band the unsaturated effort is clamped and the plant
//! then follows dy/dt = (−y + k·u) / τ. Starting from rest, the proportional,
//! integral and derivative contributions are reported alongside the output.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{ControlSignals, TimeGrid, Trajectory};
use crate::error::{Result, TuningError};
use crate::model::PlantParameters;
use crate::solvers::{integrate, IntegrationOptions};
use crate::utils::constants::STEP_REFERENCE;

/// Bounds applied to the control effort before it reaches the plant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Saturation {
    pub min: f64,
    pub max: f64,
}

impl Saturation {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(TuningError::invalid(format!(
                "saturation bounds must satisfy min < max, got [{min}, {max}]"
            )));
        }
        Ok(Self { min, max })
    }

    #[inline]
    pub fn apply(&self, u: f64) -> f64 {
        u.clamp(self.min, self.max)
    }
}

/// Everything the loop dynamics depend on
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PiLoopParams {
    pub kp: f64,
    pub ki: f64,
    /// Derivative gain on the measurement; zero for a PI loop
    pub kd: f64,
    pub plant: PlantParameters,
    /// Step reference r
    pub reference: f64,
    pub saturation: Option<Saturation>,
}

impl PiLoopParams {
    /// Unsaturated loop tracking a unit step
    pub fn new(kp: f64, ki: f64, plant: PlantParameters) -> Result<Self> {
        if !(kp.is_finite() && ki.is_finite()) {
            return Err(TuningError::invalid(format!(
                "gains must be finite, got K_P={kp}, K_I={ki}"
            )));
        }
        Ok(Self {
            kp,
            ki,
            kd: 0.0,
            plant,
            reference: STEP_REFERENCE,
            saturation: None,
        })
    }

    /// Add derivative-on-measurement with gain `kd`
    pub fn with_derivative(mut self, kd: f64) -> Result<Self> {
        if !(kd.is_finite() && kd >= 0.0) {
            return Err(TuningError::invalid(format!(
                "derivative gain must be non-negative, got {kd}"
            )));
        }
        // Leading coefficient of the closed loop
        if self.plant.tau() + self.plant.k() * kd == 0.0 {
            return Err(TuningError::DegenerateConfiguration(format!(
                "τ + k·K_D vanishes for K_D = {kd}"
            )));
        }
        self.kd = kd;
        Ok(self)
    }

    pub fn with_saturation(mut self, saturation: Saturation) -> Self {
        self.saturation = Some(saturation);
        self
    }

    pub fn with_reference(mut self, reference: f64) -> Self {
        self.reference = reference;
        self
    }

    /// Output slope and the control split (u, P, I, D) at state [y, z]
    fn evaluate(&self, y: f64, z: f64) -> (f64, ControlSplit) {
        let (k, tau) = (self.plant.k(), self.plant.tau());
        let p = self.kp * (self.reference - y);
        let i = self.ki * z;
        let dy = (-y + k * (p + i)) / (tau + k * self.kd);
        let u = p + i - self.kd * dy;

        match self.saturation {
            Some(sat) if sat.apply(u) != u => {
                let clamped = sat.apply(u);
                let dy = (-y + k * clamped) / tau;
                (dy, ControlSplit { u: clamped, p, i, d: clamped - p - i })
            }
            _ => (dy, ControlSplit { u, p, i, d: u - p - i }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ControlSplit {
    u: f64,
    p: f64,
    i: f64,
    d: f64,
}

/// Right-hand side of the PI loop at `state` = [y, z]
pub fn pi_loop_dynamics(params: &PiLoopParams, state: &DVector<f64>) -> DVector<f64> {
    let (y, z) = (state[0], state[1]);
    let (dy, _) = params.evaluate(y, z);
    DVector::from_vec(vec![dy, params.reference - y])
}

/// Step response of the PI loop with default integration options
pub fn step_response_integrated(
    kp: f64,
    ki: f64,
    plant: &PlantParameters,
    grid: &TimeGrid,
) -> Result<Trajectory> {
    let params = PiLoopParams::new(kp, ki, *plant)?;
    step_response_integrated_with(&params, grid, &IntegrationOptions::default())
}

/// Step response of the loop, sampled exactly on `grid`
///
/// # Errors
///
/// `NumericalDivergence` if the integrator cannot hold its tolerance; no
/// partial trajectory is returned in that case.
pub fn step_response_integrated_with(
    params: &PiLoopParams,
    grid: &TimeGrid,
    options: &IntegrationOptions,
) -> Result<Trajectory> {
    let states = integrate(
        |x, _t| pi_loop_dynamics(params, x),
        DVector::zeros(2),
        grid.as_slice(),
        options,
    )?;

    let n = states.len();
    let mut output = Vec::with_capacity(n);
    let mut signals = ControlSignals {
        control: Vec::with_capacity(n),
        proportional: Vec::with_capacity(n),
        integral: Vec::with_capacity(n),
        derivative: Vec::with_capacity(n),
    };
    for state in &states {
        let (_, split) = params.evaluate(state[0], state[1]);
        output.push(state[0]);
        signals.control.push(split.u);
        signals.proportional.push(split.p);
        signals.integral.push(split.i);
        signals.derivative.push(split.d);
    }

    Trajectory::new(grid.as_slice().to_vec(), output)?.with_signals(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_plant() -> PlantParameters {
        PlantParameters::new(1.0, 1.0).unwrap()
    }

    #[test]
    fn test_dynamics_at_rest() {
        let params = PiLoopParams::new(7.0, 16.0, unit_plant()).unwrap();
        let dx = pi_loop_dynamics(&params, &DVector::zeros(2));
        // e = 1, u = 7
        assert_relative_eq!(dx[0], 7.0);
        assert_relative_eq!(dx[1], 1.0);
    }

    #[test]
    fn test_matches_closed_form() {
        let grid = TimeGrid::linspace(0.0, 2.0, 201).unwrap();
        let params = PiLoopParams::new(7.0, 16.0, unit_plant()).unwrap();
        let traj = step_response_integrated_with(
            &params,
            &grid,
            &IntegrationOptions::with_tolerances(1e-10, 1e-9),
        )
        .unwrap();

        for (t, y) in traj.samples() {
            let exact = 1.0 - (-4.0 * t).exp() + 3.0 * t * (-4.0 * t).exp();
            assert_relative_eq!(y, exact, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_signals_split() {
        let grid = TimeGrid::linspace(0.0, 1.0, 11).unwrap();
        let traj = step_response_integrated(2.0, 3.0, &unit_plant(), &grid).unwrap();
        let signals = traj.signals().unwrap();

        assert_relative_eq!(signals.proportional[0], 2.0);
        assert_relative_eq!(signals.integral[0], 0.0);
        for i in 0..traj.len() {
            assert_eq!(signals.derivative[i], 0.0);
            assert_relative_eq!(
                signals.control[i] - signals.proportional[i],
                signals.integral[i],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_derivative_on_measurement_at_rest() {
        // K_D = 10 stretches the leading coefficient to τ + k·K_D = 11
        let params = PiLoopParams::new(87.0, 176.0, unit_plant())
            .unwrap()
            .with_derivative(10.0)
            .unwrap();
        let dx = pi_loop_dynamics(&params, &DVector::zeros(2));
        assert_relative_eq!(dx[0], 87.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(dx[1], 1.0);

        let (_, split) = params.evaluate(0.0, 0.0);
        assert_relative_eq!(split.u, 87.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(split.d, -870.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_derivative_matches_closed_form() {
        // K_D = 2 re-solved for the double pole at −4: K_P = 23, K_I = 48
        //   => y(t) = 1 − e^{−4t} + (a − 4)·t·e^{−4t}, a = 8 − 1/3
        let grid = TimeGrid::linspace(0.0, 2.0, 201).unwrap();
        let params = PiLoopParams::new(23.0, 48.0, unit_plant())
            .unwrap()
            .with_derivative(2.0)
            .unwrap();
        let traj = step_response_integrated_with(
            &params,
            &grid,
            &IntegrationOptions::with_tolerances(1e-10, 1e-9),
        )
        .unwrap();

        let a = 8.0 - 1.0 / 3.0;
        for (t, y) in traj.samples() {
            let exact = 1.0 - (-4.0 * t).exp() + (a - 4.0) * t * (-4.0 * t).exp();
            assert_relative_eq!(y, exact, epsilon = 1e-6);
        }

        // Unsaturated effort is the sum of its three contributions
        let signals = traj.signals().unwrap();
        for i in 0..traj.len() {
            let sum = signals.proportional[i] + signals.integral[i] + signals.derivative[i];
            assert_relative_eq!(signals.control[i], sum, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_negative_derivative_rejected() {
        let params = PiLoopParams::new(1.0, 1.0, unit_plant()).unwrap();
        assert!(matches!(
            params.with_derivative(-1.0),
            Err(TuningError::InvalidInput(_))
        ));

        let reversed = PiLoopParams::new(1.0, 1.0, PlantParameters::new(-2.0, 1.0).unwrap());
        assert!(matches!(
            reversed.unwrap().with_derivative(0.5),
            Err(TuningError::DegenerateConfiguration(_))
        ));
    }

    #[test]
    fn test_saturation_limits_control() {
        let grid = TimeGrid::linspace(0.0, 5.0, 101).unwrap();
        let sat = Saturation::new(0.0, 2.0).unwrap();
        let params = PiLoopParams::new(7.0, 16.0, unit_plant())
            .unwrap()
            .with_saturation(sat);
        let traj =
            step_response_integrated_with(&params, &grid, &IntegrationOptions::default()).unwrap();

        let control = &traj.signals().unwrap().control;
        assert!(control.iter().all(|&u| (0.0..=2.0).contains(&u)));
        assert_eq!(control[0], 2.0);
        // Clamped at 2 the output can approach at most k·u_max
        assert!(traj.output().iter().all(|&y| y <= 2.0 + 1e-9));
    }

    #[test]
    fn test_saturation_bounds() {
        assert!(Saturation::new(1.0, 1.0).is_err());
        assert!(Saturation::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_divergence_reported() {
        let grid = TimeGrid::linspace(0.0, 1.0, 3).unwrap();
        let params = PiLoopParams::new(7.0, 16.0, unit_plant()).unwrap();
        let options = IntegrationOptions {
            max_steps: 1,
            ..IntegrationOptions::default()
        };
        let err = step_response_integrated_with(&params, &grid, &options).unwrap_err();
        assert!(matches!(err, TuningError::NumericalDivergence { .. }));
    }
}
