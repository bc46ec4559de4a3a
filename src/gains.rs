//! Pole placement by characteristic polynomial coefficient matching
//!
//! With derivative-on-measurement the closed loop around G(s) = k/(τs + 1) has
//! the characteristic polynomial
//!
//! ```text
//!   (τ + k·K_D)s² + (1 + k·K_P)s + k·K_I
//! ```
//!
//! and the target is (τ + k·K_D)(s² + 2ζω_n s + ω_n²). The derivative gain
//! only stretches the leading coefficient, so K_P and K_I follow in closed form
//! for any K_D ≥ 0.

use crate::error::{Result, TuningError};
use crate::model::{ControllerGains, PlantParameters, TargetPoles};
use crate::utils::constants::SETTLING_TIME_FACTOR;

fn require_actuation(plant: &PlantParameters) -> Result<()> {
    if plant.k() == 0.0 {
        return Err(TuningError::DegenerateConfiguration(
            "plant gain k = 0 leaves the controller nothing to actuate".to_string(),
        ));
    }
    Ok(())
}

/// Gains placing the closed-loop poles at `target` for the derivative gain `kd`
///
/// ```text
///   K_P = [(τ + k·K_D)·2ζω_n − 1] / k
///   K_I = [(τ + k·K_D)·ω_n²] / k
/// ```
///
/// # Errors
///
/// - `InvalidInput` if `kd` is negative or not finite
/// - `DegenerateConfiguration` if the plant gain is zero
pub fn solve(target: &TargetPoles, plant: &PlantParameters, kd: f64) -> Result<ControllerGains> {
    if !(kd.is_finite() && kd >= 0.0) {
        return Err(TuningError::invalid(format!(
            "derivative gain must be non-negative, got {kd}"
        )));
    }
    require_actuation(plant)?;

    let k = plant.k();
    let lead = plant.tau() + k * kd;
    let kp = (lead * 2.0 * target.zeta() * target.omega_n() - 1.0) / k;
    let ki = lead * target.omega_n() * target.omega_n() / k;

    ControllerGains::new(kp, ki, kd)
}

/// Actual closed-loop denominator [(τ + k·K_D), (1 + k·K_P), k·K_I]
pub fn characteristic_polynomial(gains: &ControllerGains, plant: &PlantParameters) -> [f64; 3] {
    let k = plant.k();
    [
        plant.tau() + k * gains.kd(),
        1.0 + k * gains.kp(),
        k * gains.ki(),
    ]
}

/// Denominator the solver aims for: (τ + k·K_D)·[1, 2ζω_n, ω_n²]
pub fn target_polynomial(target: &TargetPoles, plant: &PlantParameters, kd: f64) -> [f64; 3] {
    let lead = plant.tau() + plant.k() * kd;
    target.polynomial().map(|c| lead * c)
}

/// PI gains (K_D = 0) imposing damping `zeta` at the natural frequency fixed by `ki`
///
/// Without a derivative term the integral gain alone sets
/// ω_n = √(k·K_I/τ), and matching the middle coefficient gives
/// K_P = (2ζ·√(τ·k·K_I) − 1) / k.
///
/// # Errors
///
/// - `DegenerateConfiguration` if the plant gain is zero
/// - `InvalidInput` if `zeta` is negative or k·K_I/τ is not positive
pub fn pi_gains_for_damping(
    zeta: f64,
    ki: f64,
    plant: &PlantParameters,
) -> Result<ControllerGains> {
    require_actuation(plant)?;
    if !(zeta.is_finite() && zeta >= 0.0) {
        return Err(TuningError::invalid(format!(
            "damping ratio must be non-negative, got {zeta}"
        )));
    }
    let loop_gain = plant.k() * ki;
    if !(loop_gain.is_finite() && loop_gain > 0.0) {
        return Err(TuningError::invalid(format!(
            "k·K_I must be positive to place PI poles, got {loop_gain}"
        )));
    }

    let kp = (2.0 * zeta * (plant.tau() * loop_gain).sqrt() - 1.0) / plant.k();
    ControllerGains::pi(kp, ki)
}

/// Natural frequency of the PI loop for a given integral gain
pub fn pi_natural_frequency(ki: f64, plant: &PlantParameters) -> Result<f64> {
    let ratio = plant.k() * ki / plant.tau();
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(TuningError::invalid(format!(
            "k·K_I/τ must be positive, got {ratio}"
        )));
    }
    Ok(ratio.sqrt())
}

/// Natural frequency of a critically damped loop that settles (2%) in `settling_time`
pub fn omega_n_for_settling_time(settling_time: f64) -> Result<f64> {
    if !(settling_time.is_finite() && settling_time > 0.0) {
        return Err(TuningError::invalid(format!(
            "settling time must be positive, got {settling_time}"
        )));
    }
    Ok(SETTLING_TIME_FACTOR / settling_time)
}
