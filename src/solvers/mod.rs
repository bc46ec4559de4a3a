//! Numerical integration solvers
//!
//! Provides the adaptive embedded Runge-Kutta pairs used by the nonlinear
//! closed-loop simulator:
//! - Dormand-Prince 5(4) (default)
//! - Bogacki-Shampine 3(2)
//! - A driver that evaluates the solution exactly at requested output times

mod base;
mod embedded;
mod integrate;

pub use base::*;
pub use embedded::{
    ButcherTableau, EmbeddedRk, IntegrationMethod, BOGACKI_SHAMPINE_32, DORMAND_PRINCE_54,
};
pub use integrate::{integrate, IntegrationOptions};
