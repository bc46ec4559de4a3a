//! Plant, pole target and controller gain records
//!
//! All three are immutable value types validated on construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TuningError};

/// First-order process G(s) = k / (τs + 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlantParameters {
    k: f64,
    tau: f64,
}

impl PlantParameters {
    /// Create a plant model
    ///
    /// A zero gain is representable (it only becomes an error once gains
    /// are designed for it); τ must be strictly positive.
    pub fn new(k: f64, tau: f64) -> Result<Self> {
        if !k.is_finite() {
            return Err(TuningError::invalid(format!("plant gain must be finite, got {k}")));
        }
        if !(tau.is_finite() && tau > 0.0) {
            return Err(TuningError::invalid(format!(
                "plant time constant must be positive, got {tau}"
            )));
        }
        Ok(Self { k, tau })
    }

    /// k = 1, τ = 1
    pub const fn unit() -> Self {
        Self { k: 1.0, tau: 1.0 }
    }

    #[inline]
    pub fn k(&self) -> f64 {
        self.k
    }

    #[inline]
    pub fn tau(&self) -> f64 {
        self.tau
    }
}

impl<'de> Deserialize<'de> for PlantParameters {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            k: f64,
            tau: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        PlantParameters::new(raw.k, raw.tau).map_err(serde::de::Error::custom)
    }
}

/// Desired closed-loop poles of s² + 2ζω_n s + ω_n²
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetPoles {
    omega_n: f64,
    zeta: f64,
}

impl TargetPoles {
    pub fn new(omega_n: f64, zeta: f64) -> Result<Self> {
        if !(omega_n.is_finite() && omega_n > 0.0) {
            return Err(TuningError::invalid(format!(
                "natural frequency must be positive, got {omega_n}"
            )));
        }
        if !(zeta.is_finite() && zeta >= 0.0) {
            return Err(TuningError::invalid(format!(
                "damping ratio must be non-negative, got {zeta}"
            )));
        }
        Ok(Self { omega_n, zeta })
    }

    /// ζ = 1 at `omega_n`, for constants known to be positive
    pub(crate) const fn critical(omega_n: f64) -> Self {
        Self { omega_n, zeta: 1.0 }
    }

    #[inline]
    pub fn omega_n(&self) -> f64 {
        self.omega_n
    }

    #[inline]
    pub fn zeta(&self) -> f64 {
        self.zeta
    }

    /// Monic target polynomial [1, 2ζω_n, ω_n²]
    pub fn polynomial(&self) -> [f64; 3] {
        [1.0, 2.0 * self.zeta * self.omega_n, self.omega_n * self.omega_n]
    }
}

impl<'de> Deserialize<'de> for TargetPoles {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            omega_n: f64,
            zeta: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        TargetPoles::new(raw.omega_n, raw.zeta).map_err(serde::de::Error::custom)
    }
}

/// PID gains; K_D acts on the measurement and is zero for PI loops
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerGains {
    kp: f64,
    ki: f64,
    kd: f64,
}

impl ControllerGains {
    /// Bundle gains, rejecting a negative or non-finite derivative gain
    pub fn new(kp: f64, ki: f64, kd: f64) -> Result<Self> {
        if !(kd.is_finite() && kd >= 0.0) {
            return Err(TuningError::invalid(format!(
                "derivative gain must be non-negative, got {kd}"
            )));
        }
        if !(kp.is_finite() && ki.is_finite()) {
            return Err(TuningError::invalid(format!(
                "gains must be finite, got K_P={kp}, K_I={ki}"
            )));
        }
        Ok(Self { kp, ki, kd })
    }

    /// PI gains (K_D = 0)
    pub fn pi(kp: f64, ki: f64) -> Result<Self> {
        Self::new(kp, ki, 0.0)
    }

    #[inline]
    pub fn kp(&self) -> f64 {
        self.kp
    }

    #[inline]
    pub fn ki(&self) -> f64 {
        self.ki
    }

    #[inline]
    pub fn kd(&self) -> f64 {
        self.kd
    }
}

impl fmt::Display for ControllerGains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K_P={:.4}, K_I={:.4}, K_D={:.4}", self.kp, self.ki, self.kd)
    }
}
