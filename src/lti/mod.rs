//! Linear time-invariant models
//!
//! Transfer functions are realized in state-space form and their unit-step
//! responses are evaluated in closed form through the matrix exponential.

mod statespace;
mod transfer_function;

pub use statespace::StateSpace;
pub use transfer_function::TransferFunction;
