//! Derivative-on-measurement closed loop as a rational transfer function
//!
//! With the derivative acting on the measurement only, the reference sees
//!
//! ```text
//!   T(s) = k(K_P s + K_I) / [(τ + k·K_D)s² + (1 + k·K_P)s + k·K_I]
//! ```

use super::{TimeGrid, Trajectory};
use crate::error::Result;
use crate::gains::characteristic_polynomial;
use crate::lti::TransferFunction;
use crate::model::{ControllerGains, PlantParameters};

/// Closed-loop transfer function from reference to plant output
pub fn closed_loop_transfer_function(
    gains: &ControllerGains,
    plant: &PlantParameters,
) -> Result<TransferFunction> {
    let k = plant.k();
    let num = [k * gains.kp(), k * gains.ki()];
    let den = characteristic_polynomial(gains, plant);
    TransferFunction::new(&num, &den)
}

/// Exact unit-step response of the derivative-on-measurement loop
///
/// Unstable loops are not rejected: their growing response is returned as is.
pub fn step_response_linear(
    gains: &ControllerGains,
    plant: &PlantParameters,
    grid: &TimeGrid,
) -> Result<Trajectory> {
    let tf = closed_loop_transfer_function(gains, plant)?;
    step_response_of(&tf, grid)
}

pub(crate) fn step_response_of(tf: &TransferFunction, grid: &TimeGrid) -> Result<Trajectory> {
    let output = tf.step_response(grid.as_slice());
    Trajectory::new(grid.as_slice().to_vec(), output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gains::solve;
    use crate::model::TargetPoles;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_loop_matches_closed_form() {
        // K_P = 7, K_I = 16: Y(s) = (7s + 16) / (s (s + 4)^2)
        //   => y(t) = 1 - e^{-4t} + 3t e^{-4t}
        let target = TargetPoles::new(4.0, 1.0).unwrap();
        let plant = PlantParameters::new(1.0, 1.0).unwrap();
        let gains = solve(&target, &plant, 0.0).unwrap();
        let grid = TimeGrid::linspace(0.0, 2.0, 201).unwrap();

        let traj = step_response_linear(&gains, &plant, &grid).unwrap();
        for (t, y) in traj.samples() {
            let exact = 1.0 - (-4.0 * t).exp() + 3.0 * t * (-4.0 * t).exp();
            assert_relative_eq!(y, exact, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_transfer_function_coefficients() {
        let plant = PlantParameters::new(2.0, 0.5).unwrap();
        let gains = ControllerGains::new(3.0, 4.0, 0.25).unwrap();
        let tf = closed_loop_transfer_function(&gains, &plant).unwrap();
        assert_eq!(tf.numerator(), &[6.0, 8.0]);
        assert_eq!(tf.denominator(), &[1.0, 7.0, 8.0]);
        assert_eq!(tf.dc_gain(), Some(1.0));
    }

    #[test]
    fn test_unstable_loop_still_returns_trajectory() {
        // Negative K_P large enough to make the middle coefficient negative
        let plant = PlantParameters::new(1.0, 1.0).unwrap();
        let gains = ControllerGains::new(-3.0, 1.0, 0.0).unwrap();
        let tf = closed_loop_transfer_function(&gains, &plant).unwrap();
        assert!(!tf.is_stable());

        let grid = TimeGrid::linspace(0.0, 10.0, 11).unwrap();
        let traj = step_response_linear(&gains, &plant, &grid).unwrap();
        assert_eq!(traj.len(), 11);
        assert!(traj.final_value().unwrap().abs() > 10.0);
    }
}
