//! Closed-loop step response simulation
//!
//! Two backends share the [`Trajectory`] output:
//!
//! - [`ClosedLoopModel::LinearRational`]: the derivative-on-measurement loop as
//!   a transfer function, evaluated exactly
//! - [`ClosedLoopModel::NonlinearIntegrated`]: the same loop with explicit
//!   integrator state, integrated adaptively (supports actuator saturation)

mod linear;
mod pi_loop;
mod trajectory;

pub use linear::{closed_loop_transfer_function, step_response_linear};
pub use pi_loop::{
    pi_loop_dynamics, step_response_integrated, step_response_integrated_with, PiLoopParams,
    Saturation,
};
pub use trajectory::{ControlSignals, TimeGrid, Trajectory};

use crate::error::Result;
use crate::lti::TransferFunction;
use crate::model::{ControllerGains, PlantParameters};
use crate::solvers::IntegrationOptions;

/// Closed-loop model selected explicitly by the caller
#[derive(Debug, Clone)]
pub enum ClosedLoopModel {
    LinearRational(TransferFunction),
    NonlinearIntegrated {
        params: PiLoopParams,
        options: IntegrationOptions,
    },
}

impl ClosedLoopModel {
    /// Rational model of the derivative-on-measurement loop
    pub fn linear(gains: &ControllerGains, plant: &PlantParameters) -> Result<Self> {
        Ok(Self::LinearRational(closed_loop_transfer_function(gains, plant)?))
    }

    /// Integrated model with default integration options
    pub fn integrated(gains: &ControllerGains, plant: &PlantParameters) -> Result<Self> {
        Self::integrated_with(gains, plant, IntegrationOptions::default())
    }

    /// Integrated model of the derivative-on-measurement loop
    pub fn integrated_with(
        gains: &ControllerGains,
        plant: &PlantParameters,
        options: IntegrationOptions,
    ) -> Result<Self> {
        let params =
            PiLoopParams::new(gains.kp(), gains.ki(), *plant)?.with_derivative(gains.kd())?;
        Ok(Self::NonlinearIntegrated { params, options })
    }

    /// Unit-step response on `grid`
    pub fn step_response(&self, grid: &TimeGrid) -> Result<Trajectory> {
        match self {
            Self::LinearRational(tf) => linear::step_response_of(tf, grid),
            Self::NonlinearIntegrated { params, options } => {
                step_response_integrated_with(params, grid, options)
            }
        }
    }

    /// False if the linear model has a pole in the closed right half plane
    ///
    /// The integrated model is judged by its characteristic polynomial
    /// without saturation.
    pub fn is_stable(&self) -> bool {
        match self {
            Self::LinearRational(tf) => tf.is_stable(),
            Self::NonlinearIntegrated { params, .. } => {
                let k = params.plant.k();
                // (τ + kK_D)s² + (1 + kK_P)s + kK_I, all coefficients of one sign
                let coeffs = [
                    params.plant.tau() + k * params.kd,
                    1.0 + k * params.kp,
                    k * params.ki,
                ];
                coeffs.iter().all(|&c| c > 0.0) || coeffs.iter().all(|&c| c < 0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_backends_agree_without_derivative() {
        let plant = PlantParameters::new(1.0, 1.0).unwrap();
        let gains = ControllerGains::pi(7.0, 16.0).unwrap();
        let grid = TimeGrid::linspace(0.0, 2.0, 401).unwrap();

        let linear = ClosedLoopModel::linear(&gains, &plant).unwrap();
        let integrated = ClosedLoopModel::integrated(&gains, &plant).unwrap();
        assert!(linear.is_stable());
        assert!(integrated.is_stable());

        let a = linear.step_response(&grid).unwrap();
        let b = integrated.step_response(&grid).unwrap();
        for (ya, yb) in a.output().iter().zip(b.output()) {
            assert_relative_eq!(*ya, *yb, epsilon = 5e-3);
        }
        assert!(a.signals().is_none());
        assert!(b.signals().is_some());
    }

    #[test]
    fn test_backends_agree_with_derivative() {
        let plant = PlantParameters::new(1.0, 1.0).unwrap();
        let gains = ControllerGains::new(87.0, 176.0, 10.0).unwrap();
        let grid = TimeGrid::linspace(0.0, 2.0, 401).unwrap();
        let options = IntegrationOptions::with_tolerances(1e-10, 1e-10);

        let linear = ClosedLoopModel::linear(&gains, &plant).unwrap();
        let integrated = ClosedLoopModel::integrated_with(&gains, &plant, options).unwrap();
        assert!(integrated.is_stable());

        let a = linear.step_response(&grid).unwrap();
        let b = integrated.step_response(&grid).unwrap();
        for (ya, yb) in a.output().iter().zip(b.output()) {
            assert_relative_eq!(*ya, *yb, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_unstable_flagged() {
        let plant = PlantParameters::new(1.0, 1.0).unwrap();
        let gains = ControllerGains::pi(-3.0, 1.0).unwrap();
        assert!(!ClosedLoopModel::linear(&gains, &plant).unwrap().is_stable());
        assert!(!ClosedLoopModel::integrated(&gains, &plant).unwrap().is_stable());
    }
}
