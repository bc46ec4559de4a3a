//! Transfer Function: SISO LTI system in polynomial form
//!
//!   H(s) = B(s) / A(s) = (b_n s^n + ... + b_0) / (a_m s^m + ... + a_0)
//!
//! Polynomials are given in **descending powers** of s. The model is realized
//! in companion form (leading denominator coefficient normalized to 1, direct
//! feedthrough split off when the degrees match) and its step response is
//! evaluated exactly through [`StateSpace`].
//!
//! References:
//! - Ogata, K. (2010). Modern Control Engineering (5th ed.). Section 5.6
//! - Chen, C.T. (1999). Linear System Theory and Design (3rd ed.). Section 5.5

use nalgebra::{Complex, DMatrix, DVector};
use std::fmt;

use super::StateSpace;
use crate::error::{Result, TuningError};

/// Rational transfer function with real coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    num: Vec<f64>,
    den: Vec<f64>,
}

impl TransferFunction {
    /// Create a transfer function from numerator and denominator coefficients
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if:
    /// - Denominator is empty or its leading coefficient is zero
    /// - Any coefficient is not finite
    /// - Numerator order exceeds denominator order (improper transfer function)
    pub fn new(num: &[f64], den: &[f64]) -> Result<Self> {
        let Some(&leading) = den.first() else {
            return Err(TuningError::invalid("denominator cannot be empty"));
        };
        if leading == 0.0 {
            return Err(TuningError::invalid(
                "leading coefficient of denominator cannot be zero",
            ));
        }
        if num.iter().chain(den).any(|c| !c.is_finite()) {
            return Err(TuningError::invalid("coefficients must be finite"));
        }
        if num.len() > den.len() {
            return Err(TuningError::invalid(format!(
                "improper transfer function not supported: num.len()={}, den.len()={}",
                num.len(),
                den.len()
            )));
        }

        Ok(Self {
            num: num.to_vec(),
            den: den.to_vec(),
        })
    }

    /// Numerator coefficients, highest degree first
    pub fn numerator(&self) -> &[f64] {
        &self.num
    }

    /// Denominator coefficients, highest degree first
    pub fn denominator(&self) -> &[f64] {
        &self.den
    }

    /// System order (denominator degree)
    pub fn order(&self) -> usize {
        self.den.len() - 1
    }

    /// Realize the transfer function in companion form
    ///
    /// ```text
    ///   A = [-a_{n-1}  -a_{n-2}  ...  -a_1  -a_0 ]      B = [1]
    ///       [   1         0      ...   0     0   ]          [0]
    ///       [   ⋮         ⋱             ⋮     ⋮   ]          [⋮]
    ///       [   0         0      ...   1     0   ]          [0]
    ///
    ///   C = [b_{n-1}  ...  b_0]   (strictly proper part)
    ///   D = b_n                   (nonzero only when degrees match)
    /// ```
    pub fn to_state_space(&self) -> StateSpace {
        let leading = self.den[0];
        let den: Vec<f64> = self.den.iter().map(|&x| x / leading).collect();
        let mut num: Vec<f64> = vec![0.0; den.len() - self.num.len()];
        num.extend(self.num.iter().map(|&x| x / leading));

        let n = den.len() - 1;
        let d = num[0];

        // Strictly proper remainder num - D·den; its leading entry is zero
        let c = DVector::from_iterator(n, (1..=n).map(|i| num[i] - d * den[i]));

        let mut a = DMatrix::zeros(n, n);
        for j in 0..n {
            a[(0, j)] = -den[j + 1];
        }
        for i in 1..n {
            a[(i, i - 1)] = 1.0;
        }

        let mut b = DVector::zeros(n);
        if n > 0 {
            b[0] = 1.0;
        }

        StateSpace::from_parts(a, b, c, d)
    }

    /// Roots of the denominator
    pub fn poles(&self) -> Vec<Complex<f64>> {
        self.to_state_space().eigenvalues()
    }

    /// True if every pole lies strictly in the left half plane
    pub fn is_stable(&self) -> bool {
        self.poles().iter().all(|p| p.re < 0.0)
    }

    /// Steady-state gain H(0), if the denominator has no pole at the origin
    pub fn dc_gain(&self) -> Option<f64> {
        let den0 = *self.den.last()?;
        if den0 == 0.0 {
            return None;
        }
        Some(self.num.last().copied().unwrap_or(0.0) / den0)
    }

    /// Unit-step response sampled at `times`
    pub fn step_response(&self, times: &[f64]) -> Vec<f64> {
        self.to_state_space().step_response(times)
    }
}

impl fmt::Display for TransferFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn poly(coeffs: &[f64]) -> String {
            let degree = coeffs.len().saturating_sub(1);
            let terms: Vec<String> = coeffs
                .iter()
                .enumerate()
                .map(|(i, c)| match degree - i {
                    0 => format!("{c}"),
                    1 => format!("{c}s"),
                    p => format!("{c}s^{p}"),
                })
                .collect();
            if terms.is_empty() {
                "0".to_string()
            } else {
                terms.join(" + ")
            }
        }
        write!(f, "({}) / ({})", poly(&self.num), poly(&self.den))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tf_first_order() {
        // H(s) = 1/(s+1)
        let ss = TransferFunction::new(&[1.0], &[1.0, 1.0]).unwrap().to_state_space();

        assert_eq!(ss.a_matrix()[(0, 0)], -1.0);
        assert_eq!(ss.b_matrix()[0], 1.0);
        assert_eq!(ss.c_matrix()[0], 1.0);
        assert_eq!(ss.d_matrix(), 0.0);
        assert!(!ss.has_passthrough());
    }

    #[test]
    fn test_tf_second_order() {
        // H(s) = 1/(s^2 + 2s + 1)
        let ss = TransferFunction::new(&[1.0], &[1.0, 2.0, 1.0]).unwrap().to_state_space();

        assert_eq!(ss.a_matrix()[(0, 0)], -2.0);
        assert_eq!(ss.a_matrix()[(0, 1)], -1.0);
        assert_eq!(ss.a_matrix()[(1, 0)], 1.0);
        assert_eq!(ss.a_matrix()[(1, 1)], 0.0);

        assert_eq!(ss.b_matrix()[0], 1.0);
        assert_eq!(ss.b_matrix()[1], 0.0);

        assert_eq!(ss.c_matrix()[0], 0.0);
        assert_eq!(ss.c_matrix()[1], 1.0);
    }

    #[test]
    fn test_tf_with_zeros() {
        // H(s) = (s+1)/(s+2) = 1 - 1/(s+2)
        let ss = TransferFunction::new(&[1.0, 1.0], &[1.0, 2.0]).unwrap().to_state_space();

        assert!(ss.has_passthrough());
        assert_eq!(ss.d_matrix(), 1.0);
        assert_eq!(ss.a_matrix()[(0, 0)], -2.0);
        assert_eq!(ss.c_matrix()[0], -1.0);
    }

    #[test]
    fn test_tf_normalization() {
        // H(s) = 2/(2s+2) = 1/(s+1)
        let ss = TransferFunction::new(&[2.0], &[2.0, 2.0]).unwrap().to_state_space();
        assert_eq!(ss.a_matrix()[(0, 0)], -1.0);
        assert_eq!(ss.c_matrix()[0], 1.0);
    }

    #[test]
    fn test_tf_invalid() {
        assert!(TransferFunction::new(&[1.0], &[]).is_err());
        assert!(TransferFunction::new(&[1.0], &[0.0, 1.0]).is_err());
        assert!(TransferFunction::new(&[1.0, 2.0, 3.0], &[1.0, 1.0]).is_err());
        assert!(TransferFunction::new(&[f64::NAN], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_tf_poles_and_stability() {
        let tf = TransferFunction::new(&[1.0], &[1.0, 3.0, 2.0]).unwrap();
        let mut re: Vec<f64> = tf.poles().iter().map(|p| p.re).collect();
        re.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(re[0], -2.0, epsilon = 1e-10);
        assert_relative_eq!(re[1], -1.0, epsilon = 1e-10);
        assert!(tf.is_stable());

        let unstable = TransferFunction::new(&[1.0], &[1.0, -1.0, 2.0]).unwrap();
        assert!(!unstable.is_stable());
    }

    #[test]
    fn test_tf_step_second_order() {
        // 1/(s+1)^2 => y(t) = 1 - (1 + t)e^{-t}
        let tf = TransferFunction::new(&[1.0], &[1.0, 2.0, 1.0]).unwrap();
        let times = [0.0, 0.5, 1.0, 4.0];
        for (t, y) in times.iter().zip(tf.step_response(&times)) {
            assert_relative_eq!(y, 1.0 - (1.0 + t) * (-t).exp(), epsilon = 1e-12);
        }
        assert_eq!(tf.dc_gain(), Some(1.0));
    }

    #[test]
    fn test_tf_display() {
        let tf = TransferFunction::new(&[7.0, 16.0], &[1.0, 8.0, 16.0]).unwrap();
        assert_eq!(tf.to_string(), "(7s + 16) / (1s^2 + 8s + 16)");
    }
}
