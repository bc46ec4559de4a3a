//! Overshoot and settling time of a sampled step response

use serde::Serialize;
use std::fmt;

use crate::error::{Result, TuningError};
use crate::model::ControllerGains;
use crate::simulate::Trajectory;
use crate::utils::constants::{SETTLING_TOLERANCE, STEP_REFERENCE};

/// When a trajectory enters the tolerance band for good
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "time")]
pub enum Settling {
    /// Never left the band; carries the first sample time
    AlwaysWithin(f64),
    /// First sample after the last excursion
    Settled(f64),
    /// Still outside the band at the last sample
    Unsettled,
}

impl Settling {
    pub fn time(&self) -> Option<f64> {
        match self {
            Settling::AlwaysWithin(t) | Settling::Settled(t) => Some(*t),
            Settling::Unsettled => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, Settling::Unsettled)
    }
}

impl fmt::Display for Settling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time() {
            Some(t) => write!(f, "{t:.6}"),
            None => f.pad("—"),
        }
    }
}

/// Step response figures of merit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepMetrics {
    /// Overshoot in percent of the target, never negative
    pub overshoot_percent: f64,
    pub peak: f64,
    pub peak_time: f64,
    pub settling: Settling,
}

/// Metrics tagged with the gains that produced them
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponseMetrics {
    pub gains: ControllerGains,
    #[serde(flatten)]
    pub metrics: StepMetrics,
}

/// Overshoot and settling time relative to `target` with a `tolerance` band
///
/// A sample is inside the band iff |y − target| ≤ tolerance·|target|. The
/// settling time is the first sample after the *last* excursion, so a
/// response that leaves the band after having entered it is not considered
/// settled early.
///
/// # Errors
///
/// `InvalidInput` for an empty trajectory, a zero or non-finite target, or a
/// negative tolerance.
pub fn extract_metrics(
    trajectory: &Trajectory,
    target: f64,
    tolerance: f64,
) -> Result<StepMetrics> {
    if trajectory.is_empty() {
        return Err(TuningError::invalid("cannot extract metrics from an empty trajectory"));
    }
    if !(target.is_finite() && target != 0.0) {
        return Err(TuningError::invalid(format!(
            "target value must be finite and nonzero, got {target}"
        )));
    }
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(TuningError::invalid(format!(
            "tolerance must be non-negative, got {tolerance}"
        )));
    }

    let time = trajectory.time();
    let output = trajectory.output();

    let (peak_index, peak) = output
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, y)| if y > best.1 { (i, y) } else { best });
    let overshoot_percent = ((peak - target) / target * 100.0).max(0.0);

    let band = tolerance * target.abs();
    let last_excursion = output.iter().rposition(|y| !((y - target).abs() <= band));
    let settling = match last_excursion {
        None => Settling::AlwaysWithin(time[0]),
        Some(l) if l + 1 < time.len() => Settling::Settled(time[l + 1]),
        Some(_) => Settling::Unsettled,
    };

    Ok(StepMetrics {
        overshoot_percent,
        peak,
        peak_time: time[peak_index],
        settling,
    })
}

/// Metrics for a unit step with the 2% band
pub fn extract_step_metrics(trajectory: &Trajectory) -> Result<StepMetrics> {
    extract_metrics(trajectory, STEP_REFERENCE, SETTLING_TOLERANCE)
}
