//! SISO state-space model with exact step response
//!
//!   dx/dt = Ax + Bu
//!   y = Cx + Du
//!
//! For a unit step held from t = 0 with x(0) = 0 the state is
//!
//!   x(t) = ∫₀ᵗ e^{Aσ} dσ · B
//!
//! which is the top-right block of exp([[A, B], [0, 0]]·t). Evaluating that
//! exponential per output time gives the response without any time-stepping
//! error, for stable and unstable A alike.

use nalgebra::{Complex, DMatrix, DVector};

use crate::error::{Result, TuningError};

/// Single-input single-output linear time-invariant model
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpace {
    /// State matrix (N×N)
    a: DMatrix<f64>,
    /// Input column (N)
    b: DVector<f64>,
    /// Output weights (N)
    c: DVector<f64>,
    /// Feedthrough
    d: f64,
}

impl StateSpace {
    /// Create a model, checking that the matrix shapes agree
    pub fn new(a: DMatrix<f64>, b: DVector<f64>, c: DVector<f64>, d: f64) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n || b.len() != n || c.len() != n {
            return Err(TuningError::invalid(format!(
                "state-space shapes disagree: A is {}x{}, B has {}, C has {}",
                a.nrows(),
                a.ncols(),
                b.len(),
                c.len()
            )));
        }
        Ok(Self::from_parts(a, b, c, d))
    }

    /// Assemble a model whose shapes are consistent by construction
    pub(crate) fn from_parts(a: DMatrix<f64>, b: DVector<f64>, c: DVector<f64>, d: f64) -> Self {
        debug_assert!(a.is_square() && b.len() == a.nrows() && c.len() == a.nrows());
        Self { a, b, c, d }
    }

    /// Number of states
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    pub fn a_matrix(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b_matrix(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn c_matrix(&self) -> &DVector<f64> {
        &self.c
    }

    pub fn d_matrix(&self) -> f64 {
        self.d
    }

    /// Returns true if there is direct feedthrough (D != 0)
    pub fn has_passthrough(&self) -> bool {
        self.d != 0.0
    }

    /// Compute state derivative: dx/dt = Ax + Bu
    pub fn derivative(&self, state: &DVector<f64>, input: f64) -> DVector<f64> {
        &self.a * state + &self.b * input
    }

    /// Compute output: y = Cx + Du
    pub fn output(&self, state: &DVector<f64>, input: f64) -> f64 {
        self.c.dot(state) + self.d * input
    }

    /// State reached at time `t` under a unit step from rest
    pub fn step_state(&self, t: f64) -> DVector<f64> {
        let n = self.order();
        if n == 0 {
            return DVector::zeros(0);
        }

        let mut augmented = DMatrix::zeros(n + 1, n + 1);
        augmented.view_mut((0, 0), (n, n)).copy_from(&self.a);
        augmented.view_mut((0, n), (n, 1)).copy_from(&self.b);

        let transition = (augmented * t).exp();
        transition.view((0, n), (n, 1)).column(0).into_owned()
    }

    /// Unit-step response sampled at `times`
    pub fn step_response(&self, times: &[f64]) -> Vec<f64> {
        times
            .iter()
            .map(|&t| self.output(&self.step_state(t), 1.0))
            .collect()
    }

    /// Eigenvalues of A, i.e. the poles of the model
    pub fn eigenvalues(&self) -> Vec<Complex<f64>> {
        if self.order() == 0 {
            return Vec::new();
        }
        self.a.complex_eigenvalues().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn first_order(rc: f64) -> StateSpace {
        StateSpace::new(
            DMatrix::from_element(1, 1, -1.0 / rc),
            DVector::from_element(1, 1.0 / rc),
            DVector::from_element(1, 1.0),
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn test_first_order_step() {
        let ss = first_order(0.5);
        let times = [0.0, 0.5, 1.0, 2.5];
        let response = ss.step_response(&times);
        for (t, y) in times.iter().zip(response) {
            assert_relative_eq!(y, 1.0 - (-t / 0.5).exp(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_unstable_grows() {
        // dx/dt = x + u, y = x  =>  y(t) = e^t - 1
        let ss = StateSpace::new(
            DMatrix::from_element(1, 1, 1.0),
            DVector::from_element(1, 1.0),
            DVector::from_element(1, 1.0),
            0.0,
        )
        .unwrap();
        let y = ss.step_response(&[3.0]);
        assert_relative_eq!(y[0], 3.0_f64.exp() - 1.0, max_relative = 1e-10);
        assert!(ss.eigenvalues()[0].re > 0.0);
    }

    #[test]
    fn test_feedthrough_at_zero() {
        let ss = StateSpace::new(
            DMatrix::from_element(1, 1, -2.0),
            DVector::from_element(1, 1.0),
            DVector::from_element(1, -1.0),
            1.0,
        )
        .unwrap();
        assert!(ss.has_passthrough());
        assert_eq!(ss.step_response(&[0.0])[0], 1.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = StateSpace::new(
            DMatrix::zeros(2, 2),
            DVector::zeros(1),
            DVector::zeros(2),
            0.0,
        );
        assert!(matches!(err, Err(TuningError::InvalidInput(_))));
    }

    #[test]
    fn test_derivative_and_output() {
        let ss = first_order(1.0);
        let x = DVector::from_element(1, 0.25);
        assert_relative_eq!(ss.derivative(&x, 1.0)[0], 0.75);
        assert_relative_eq!(ss.output(&x, 1.0), 0.25);
    }
}
