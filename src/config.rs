//! Sweep configuration loaded from JSON
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "target": { "omega_n": 6.0, "zeta": 0.8 }, "parallel": true }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TuningError};
use crate::model::{PlantParameters, TargetPoles};
use crate::simulate::{Saturation, TimeGrid};
use crate::solvers::IntegrationOptions;
use crate::utils::constants::*;

/// Which closed-loop backend a sweep simulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Exact rational transfer function
    #[default]
    Linear,
    /// Adaptive integration of the PI loop (K_D ignored)
    Integrated,
}

/// Evenly spaced sample times `[start, stop]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub start: f64,
    pub stop: f64,
    pub samples: usize,
}

impl GridConfig {
    pub fn build(&self) -> Result<TimeGrid> {
        TimeGrid::linspace(self.start, self.stop, self.samples)
    }
}

/// Values `start, start + step, ...` strictly below `stop`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl ParameterRange {
    pub fn values(&self) -> Result<Vec<f64>> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(TuningError::invalid(format!(
                "range step must be positive, got {}",
                self.step
            )));
        }
        if !(self.start.is_finite() && self.stop.is_finite()) {
            return Err(TuningError::invalid("range bounds must be finite"));
        }
        // Index-based so the values do not accumulate rounding error
        let count = ((self.stop - self.start) / self.step).ceil().max(0.0) as usize;
        Ok((0..count)
            .map(|i| self.start + i as f64 * self.step)
            .filter(|v| *v < self.stop)
            .collect())
    }
}

/// Derivative-gain sweep at fixed pole targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub plant: PlantParameters,
    pub target: TargetPoles,
    pub kd_values: Vec<f64>,
    pub grid: GridConfig,
    /// Relative half-width of the settling band
    pub tolerance: f64,
    /// Setpoint the metrics are measured against
    pub target_value: f64,
    pub backend: Backend,
    pub integration: IntegrationOptions,
    /// Evaluate sweep points on worker threads
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let step = DEFAULT_KD_MAX / (DEFAULT_KD_COUNT - 1) as f64;
        Self {
            plant: PlantParameters::unit(),
            target: TargetPoles::critical(DEFAULT_OMEGA_N),
            kd_values: (0..DEFAULT_KD_COUNT).map(|i| i as f64 * step).collect(),
            grid: GridConfig {
                start: 0.0,
                stop: DEFAULT_SWEEP_HORIZON,
                samples: DEFAULT_SWEEP_SAMPLES,
            },
            tolerance: SETTLING_TOLERANCE,
            target_value: STEP_REFERENCE,
            backend: Backend::default(),
            integration: IntegrationOptions::default(),
            parallel: false,
        }
    }
}

impl SweepConfig {
    /// Load a config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        log::debug!("loaded sweep config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the fields serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if self.kd_values.is_empty() {
            return Err(TuningError::invalid("sweep needs at least one K_D value"));
        }
        validate_band(self.tolerance, self.target_value)?;
        self.grid.build().map(|_| ())
    }

    pub fn time_grid(&self) -> Result<TimeGrid> {
        self.grid.build()
    }
}

/// PI sweep over damping ratio at a fixed integral gain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampingSweepConfig {
    pub plant: PlantParameters,
    pub ki: f64,
    pub zeta: ParameterRange,
    pub grid: GridConfig,
    pub tolerance: f64,
    pub target_value: f64,
    pub saturation: Option<Saturation>,
    pub integration: IntegrationOptions,
    pub parallel: bool,
}

impl Default for DampingSweepConfig {
    fn default() -> Self {
        Self {
            plant: PlantParameters::unit(),
            ki: DEFAULT_PI_KI,
            zeta: ParameterRange {
                start: DEFAULT_ZETA_START,
                stop: DEFAULT_ZETA_STOP,
                step: DEFAULT_ZETA_STEP,
            },
            grid: GridConfig {
                start: 0.0,
                stop: DEFAULT_PI_HORIZON,
                samples: DEFAULT_PI_SAMPLES,
            },
            tolerance: SETTLING_TOLERANCE,
            target_value: STEP_REFERENCE,
            saturation: None,
            integration: IntegrationOptions::default(),
            parallel: false,
        }
    }
}

impl DampingSweepConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.zeta.values()?.is_empty() {
            return Err(TuningError::invalid("damping range is empty"));
        }
        if let Some(sat) = self.saturation {
            Saturation::new(sat.min, sat.max)?;
        }
        validate_band(self.tolerance, self.target_value)?;
        self.grid.build().map(|_| ())
    }

    pub fn time_grid(&self) -> Result<TimeGrid> {
        self.grid.build()
    }
}

fn validate_band(tolerance: f64, target_value: f64) -> Result<()> {
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(TuningError::invalid(format!(
            "tolerance must be non-negative, got {tolerance}"
        )));
    }
    if !(target_value.is_finite() && target_value != 0.0) {
        return Err(TuningError::invalid(format!(
            "target value must be finite and nonzero, got {target_value}"
        )));
    }
    Ok(())
}
