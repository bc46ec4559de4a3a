//! Pole geometry and canonical step response of s² + 2ζω_n s + ω_n²
//!
//! The three damping regimes place the poles as
//!
//! ```text
//!   ζ < 1   s = −ζω_n ± jω_n√(1 − ζ²)     complex conjugate pair
//!   ζ = 1   s = −ω_n (double)              repeated real
//!   ζ > 1   s = −ζω_n ± ω_n√(ζ² − 1)       distinct real
//! ```
//!
//! A damping ratio within `CRITICAL_DAMPING_BAND` of one is treated as
//! critically damped.

use nalgebra::Complex;
use serde::Serialize;
use std::fmt;

use crate::error::{Result, TuningError};
use crate::model::TargetPoles;
use crate::simulate::{TimeGrid, Trajectory};
use crate::utils::constants::CRITICAL_DAMPING_BAND;

/// Location of the two closed-loop poles
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PoleGeometry {
    /// Underdamped: real ± j·imag with imag > 0
    ComplexPair { real: f64, imag: f64 },
    /// Critically damped double pole
    Repeated { real: f64 },
    /// Overdamped: `fast` < `slow` < 0
    DistinctReal { fast: f64, slow: f64 },
}

impl PoleGeometry {
    /// Both poles as complex numbers
    pub fn roots(&self) -> [Complex<f64>; 2] {
        match *self {
            PoleGeometry::ComplexPair { real, imag } => {
                [Complex::new(real, imag), Complex::new(real, -imag)]
            }
            PoleGeometry::Repeated { real } => [Complex::new(real, 0.0); 2],
            PoleGeometry::DistinctReal { fast, slow } => {
                [Complex::new(slow, 0.0), Complex::new(fast, 0.0)]
            }
        }
    }

    /// Real part of the slowest pole, which governs settling
    pub fn dominant_real(&self) -> f64 {
        match *self {
            PoleGeometry::ComplexPair { real, .. } | PoleGeometry::Repeated { real } => real,
            PoleGeometry::DistinctReal { slow, .. } => slow,
        }
    }
}

impl fmt::Display for PoleGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoleGeometry::ComplexPair { real, imag } => write!(f, "{real:.4} ± j{imag:.4}"),
            PoleGeometry::Repeated { real } => write!(f, "{real:.4} (double)"),
            PoleGeometry::DistinctReal { fast, slow } => write!(f, "{slow:.4}, {fast:.4}"),
        }
    }
}

fn is_critical(zeta: f64) -> bool {
    (zeta - 1.0).abs() < CRITICAL_DAMPING_BAND
}

/// Pole locations for natural frequency `omega_n` and damping `zeta`
pub fn second_order_poles(omega_n: f64, zeta: f64) -> Result<PoleGeometry> {
    let target = TargetPoles::new(omega_n, zeta)?;
    Ok(poles_of(&target))
}

/// Pole locations of a validated target
pub fn poles_of(target: &TargetPoles) -> PoleGeometry {
    let (wn, zeta) = (target.omega_n(), target.zeta());
    if is_critical(zeta) {
        PoleGeometry::Repeated { real: -wn }
    } else if zeta < 1.0 {
        PoleGeometry::ComplexPair {
            real: -zeta * wn,
            imag: wn * (1.0 - zeta * zeta).sqrt(),
        }
    } else {
        let spread = wn * (zeta * zeta - 1.0).sqrt();
        PoleGeometry::DistinctReal {
            fast: -zeta * wn - spread,
            slow: -zeta * wn + spread,
        }
    }
}

/// Poles traced over a range of damping ratios at fixed `omega_n`
pub fn pole_locus(omega_n: f64, zetas: &[f64]) -> Result<Vec<(f64, PoleGeometry)>> {
    zetas
        .iter()
        .map(|&zeta| Ok((zeta, second_order_poles(omega_n, zeta)?)))
        .collect()
}

/// Unit-step response of ω_n² / (s² + 2ζω_n s + ω_n²) at time `t`
pub fn canonical_step_response(omega_n: f64, zeta: f64, t: f64) -> Result<f64> {
    let target = TargetPoles::new(omega_n, zeta)?;
    if !(t.is_finite() && t >= 0.0) {
        return Err(TuningError::invalid(format!("time must be non-negative, got {t}")));
    }
    Ok(canonical_response_at(&target, t))
}

fn canonical_response_at(target: &TargetPoles, t: f64) -> f64 {
    let (wn, zeta) = (target.omega_n(), target.zeta());
    match poles_of(target) {
        PoleGeometry::ComplexPair { imag, .. } => {
            let root = (1.0 - zeta * zeta).sqrt();
            let phi = zeta.acos();
            1.0 - (-zeta * wn * t).exp() * (imag * t + phi).sin() / root
        }
        PoleGeometry::Repeated { .. } => 1.0 - (1.0 + wn * t) * (-wn * t).exp(),
        PoleGeometry::DistinctReal { fast, slow } => {
            let gap = fast - slow;
            1.0 - (fast * (slow * t).exp() - slow * (fast * t).exp()) / gap
        }
    }
}

/// Canonical step response sampled on `grid`
pub fn canonical_step_trajectory(target: &TargetPoles, grid: &TimeGrid) -> Result<Trajectory> {
    let output = grid
        .as_slice()
        .iter()
        .map(|&t| canonical_response_at(target, t))
        .collect();
    Trajectory::new(grid.as_slice().to_vec(), output)
}
