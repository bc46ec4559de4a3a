//! Time grids and sampled trajectories

use serde::Serialize;

use crate::error::{Result, TuningError};

/// Fixed, strictly increasing, non-negative sample times
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeGrid {
    times: Vec<f64>,
}

impl TimeGrid {
    /// `samples` evenly spaced times from `start` to `stop` inclusive
    pub fn linspace(start: f64, stop: f64, samples: usize) -> Result<Self> {
        if samples == 0 {
            return Err(TuningError::invalid("time grid needs at least one sample"));
        }
        if samples == 1 {
            return Self::from_samples(vec![start]);
        }
        if !(stop > start) {
            return Err(TuningError::invalid(format!(
                "time grid stop {stop} must exceed start {start}"
            )));
        }

        let step = (stop - start) / (samples - 1) as f64;
        let mut times: Vec<f64> = (0..samples).map(|i| start + i as f64 * step).collect();
        times[samples - 1] = stop;
        Self::from_samples(times)
    }

    /// Wrap explicit sample times after validating them
    pub fn from_samples(times: Vec<f64>) -> Result<Self> {
        if times.is_empty() {
            return Err(TuningError::invalid("time grid cannot be empty"));
        }
        validate_times(&times)?;
        Ok(Self { times })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Final sample time
    pub fn horizon(&self) -> f64 {
        self.times[self.times.len() - 1]
    }
}

/// Sample times must be finite, non-negative and strictly increasing
fn validate_times(times: &[f64]) -> Result<()> {
    if times.iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
        return Err(TuningError::invalid(
            "sample times must be finite and non-negative",
        ));
    }
    if times.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(TuningError::invalid("sample times must be strictly increasing"));
    }
    Ok(())
}

/// Controller signals recorded alongside the output of the nonlinear loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSignals {
    /// Control effort applied to the plant
    pub control: Vec<f64>,
    /// Proportional contribution K_P·e
    pub proportional: Vec<f64>,
    /// Integral contribution K_I·z
    pub integral: Vec<f64>,
    /// Derivative-on-measurement contribution −K_D·dy/dt
    pub derivative: Vec<f64>,
}

/// Sampled closed-loop output on a fixed grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    time: Vec<f64>,
    output: Vec<f64>,
    signals: Option<ControlSignals>,
}

impl Trajectory {
    /// Pair sample times with outputs
    ///
    /// Both must have the same length and the times must be strictly
    /// increasing and non-negative, as on a [`TimeGrid`].
    pub fn new(time: Vec<f64>, output: Vec<f64>) -> Result<Self> {
        validate_times(&time)?;
        if time.len() != output.len() {
            return Err(TuningError::invalid(format!(
                "trajectory has {} times but {} outputs",
                time.len(),
                output.len()
            )));
        }
        Ok(Self {
            time,
            output,
            signals: None,
        })
    }

    /// Attach controller signals sampled on the same grid
    pub fn with_signals(mut self, signals: ControlSignals) -> Result<Self> {
        let n = self.time.len();
        let lengths = [
            signals.control.len(),
            signals.proportional.len(),
            signals.integral.len(),
            signals.derivative.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(TuningError::invalid(
                "control signals must match the trajectory length",
            ));
        }
        self.signals = Some(signals);
        Ok(self)
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    pub fn signals(&self) -> Option<&ControlSignals> {
        self.signals.as_ref()
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Last output sample
    pub fn final_value(&self) -> Option<f64> {
        self.output.last().copied()
    }

    /// Iterate (time, output) pairs
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.output.iter().copied())
    }
}
