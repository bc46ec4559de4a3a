//! Embedded explicit Runge-Kutta pairs with adaptive error control
//!
//! Both supported pairs are FSAL ("first same as last"): the second to last
//! row of the stage matrix holds the propagating weights, so after the
//! penultimate stage the state already is the high-order solution and the
//! final stage only feeds the error estimate.
//!
//! References:
//! - Dormand, J. R., & Prince, P. J. (1980). "A family of embedded
//!   Runge-Kutta formulae". J. Comput. Appl. Math., 6(1), 19-26.
//! - Bogacki, P., & Shampine, L. F. (1989). "A 3(2) pair of Runge-Kutta
//!   formulas". Appl. Math. Letters, 2(4), 321-325.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{ExplicitSolver, Solver, SolverError, SolverStepResult};
use crate::utils::constants::{
    SOL_BETA, SOL_ERROR_FLOOR, SOL_SCALE_MAX, SOL_SCALE_MIN, SOL_TOLERANCE_LTE_ABS,
    SOL_TOLERANCE_LTE_REL,
};

/// Butcher tableau of an FSAL embedded pair
#[derive(Debug)]
pub struct ButcherTableau {
    /// Stage evaluation times as fractions of the step
    pub c: &'static [f64],
    /// Stage coefficients; row `i` builds the state for stage `i + 1`
    pub a: &'static [&'static [f64]],
    /// Difference between propagating and embedded weights
    pub tr: &'static [f64],
    /// Order of the propagating solution
    pub order: usize,
    /// Order used for timestep control (the lower of the pair)
    pub error_order: usize,
}

/// Dormand-Prince 5(4), the pair behind `ode45` and `solve_ivp`'s RK45
#[rustfmt::skip]
pub const DORMAND_PRINCE_54: ButcherTableau = ButcherTableau {
    c: &[0.0, 1.0/5.0, 3.0/10.0, 4.0/5.0, 8.0/9.0, 1.0, 1.0],
    a: &[
        &[1.0/5.0],
        &[3.0/40.0, 9.0/40.0],
        &[44.0/45.0, -56.0/15.0, 32.0/9.0],
        &[19372.0/6561.0, -25360.0/2187.0, 64448.0/6561.0, -212.0/729.0],
        &[9017.0/3168.0, -355.0/33.0, 46732.0/5247.0, 49.0/176.0, -5103.0/18656.0],
        &[35.0/384.0, 0.0, 500.0/1113.0, 125.0/192.0, -2187.0/6784.0, 11.0/84.0],
    ],
    tr: &[
        71.0/57600.0, 0.0, -71.0/16695.0, 71.0/1920.0,
        -17253.0/339200.0, 22.0/525.0, -1.0/40.0,
    ],
    order: 5,
    error_order: 4,
};

/// Bogacki-Shampine 3(2), `solve_ivp`'s RK23
#[rustfmt::skip]
pub const BOGACKI_SHAMPINE_32: ButcherTableau = ButcherTableau {
    c: &[0.0, 1.0/2.0, 3.0/4.0, 1.0],
    a: &[
        &[1.0/2.0],
        &[0.0, 3.0/4.0],
        &[2.0/9.0, 1.0/3.0, 4.0/9.0],
    ],
    tr: &[-5.0/72.0, 1.0/12.0, 1.0/9.0, -1.0/8.0],
    order: 3,
    error_order: 2,
};

/// Integration method selectable by callers and configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMethod {
    /// Dormand-Prince 5(4)
    #[default]
    Rk45,
    /// Bogacki-Shampine 3(2)
    Rk23,
}

impl IntegrationMethod {
    pub fn tableau(self) -> &'static ButcherTableau {
        match self {
            IntegrationMethod::Rk45 => &DORMAND_PRINCE_54,
            IntegrationMethod::Rk23 => &BOGACKI_SHAMPINE_32,
        }
    }
}

/// Adaptive explicit Runge-Kutta solver driven one stage at a time
#[derive(Debug, Clone)]
pub struct EmbeddedRk {
    tableau: &'static ButcherTableau,
    state: DVector<f64>,
    initial: DVector<f64>,
    history: VecDeque<DVector<f64>>,
    slopes: Vec<DVector<f64>>,
    stage: usize,
    tol_abs: f64,
    tol_rel: f64,
}

impl EmbeddedRk {
    /// Create a solver with the default local error tolerances
    pub fn new(method: IntegrationMethod, initial: DVector<f64>) -> Self {
        Self::with_tolerances(method, initial, SOL_TOLERANCE_LTE_ABS, SOL_TOLERANCE_LTE_REL)
    }

    /// Create a solver with custom tolerances
    pub fn with_tolerances(
        method: IntegrationMethod,
        initial: DVector<f64>,
        tol_abs: f64,
        tol_rel: f64,
    ) -> Self {
        let tableau = method.tableau();
        let n = initial.len();
        Self {
            tableau,
            state: initial.clone(),
            initial,
            history: VecDeque::with_capacity(2),
            slopes: vec![DVector::zeros(n); tableau.c.len()],
            stage: 0,
            tol_abs,
            tol_rel,
        }
    }

    /// Scaled max-norm of the local error and the proposed timestep scale
    fn error_controller(&self, dt: f64) -> (bool, f64, f64) {
        let mut error_slope = DVector::zeros(self.state.len());
        for (slope, &coef) in self.slopes.iter().zip(self.tableau.tr) {
            error_slope += coef * slope;
        }

        let scale = self.state.map(|x| self.tol_abs + self.tol_rel * x.abs());
        let scaled_error = (dt * &error_slope).component_div(&scale).map(f64::abs);
        let error_norm = scaled_error.max().max(SOL_ERROR_FLOOR);

        let exponent = 1.0 / (self.tableau.error_order as f64 + 1.0);
        let timestep_scale =
            (SOL_BETA / error_norm.powf(exponent)).clamp(SOL_SCALE_MIN, SOL_SCALE_MAX);

        (error_norm <= 1.0, error_norm, timestep_scale)
    }
}

impl Solver for EmbeddedRk {
    fn state(&self) -> &DVector<f64> {
        &self.state
    }

    fn buffer(&mut self, _dt: f64) {
        if self.history.len() >= 2 {
            self.history.pop_back();
        }
        self.history.push_front(self.state.clone());
        self.stage = 0;
    }

    fn revert(&mut self) -> Result<(), SolverError> {
        self.state = self.history.pop_front().ok_or(SolverError::EmptyHistory)?;
        self.stage = 0;
        Ok(())
    }

    fn reset(&mut self) {
        self.state = self.initial.clone();
        self.history.clear();
        self.stage = 0;
    }

    fn order(&self) -> usize {
        self.tableau.order
    }

    fn stages(&self) -> usize {
        self.tableau.c.len()
    }

    fn is_adaptive(&self) -> bool {
        true
    }
}

impl ExplicitSolver for EmbeddedRk {
    fn step<F>(&mut self, mut f: F, t: f64, dt: f64) -> Result<SolverStepResult, SolverError>
    where
        F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
    {
        let x0 = self.history.front().ok_or(SolverError::EmptyHistory)?;
        let last = self.tableau.c.len() - 1;

        self.slopes[self.stage] = f(&self.state, t + self.tableau.c[self.stage] * dt);

        if self.stage < last {
            let mut slope_sum = DVector::zeros(x0.len());
            for (slope, &coef) in self.slopes.iter().zip(self.tableau.a[self.stage]) {
                slope_sum += coef * slope;
            }
            self.state = x0 + dt * slope_sum;
            self.stage += 1;

            Ok(SolverStepResult::default())
        } else {
            let (success, error_norm, scale) = self.error_controller(dt);
            self.stage = 0;

            Ok(SolverStepResult {
                success,
                error_norm,
                scale: Some(scale),
            })
        }
    }
}
