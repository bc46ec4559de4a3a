//! Simulation constants and defaults

/// Initial timestep tried by the adaptive integrator
pub const SIM_TIMESTEP: f64 = 0.001;

/// Minimum timestep for adaptive solvers
pub const SIM_TIMESTEP_MIN: f64 = 1e-12;

/// Maximum timestep for adaptive solvers
pub const SIM_TIMESTEP_MAX: f64 = 1.0;

/// Upper bound on accepted plus rejected steps over one horizon
pub const SIM_STEPS_MAX: usize = 1_000_000;

/// Minimum scale factor for timestep adjustment
pub const SOL_SCALE_MIN: f64 = 0.1;

/// Maximum scale factor for timestep adjustment
pub const SOL_SCALE_MAX: f64 = 10.0;

/// Safety factor for adaptive error control
pub const SOL_BETA: f64 = 0.9;

/// Default absolute tolerance for local truncation error
pub const SOL_TOLERANCE_LTE_ABS: f64 = 1e-6;

/// Default relative tolerance for local truncation error
pub const SOL_TOLERANCE_LTE_REL: f64 = 1e-3;

/// Lower bound on the scaled error norm
pub const SOL_ERROR_FLOOR: f64 = 1e-16;

/// Unit step reference applied to every closed loop
pub const STEP_REFERENCE: f64 = 1.0;

/// Relative half-width of the settling band (2%)
pub const SETTLING_TOLERANCE: f64 = 0.02;

/// Damping ratios closer than this to 1 are treated as critically damped
pub const CRITICAL_DAMPING_BAND: f64 = 1e-6;

/// Natural frequency multiple that gives the 2% settling time of a critically damped loop
pub const SETTLING_TIME_FACTOR: f64 = 4.0;

/// Derivative gains swept by default: 0, 1, ..., 10
pub const DEFAULT_KD_MAX: f64 = 10.0;
pub const DEFAULT_KD_COUNT: usize = 11;

/// Default natural frequency of the K_D sweep [rad/s]
pub const DEFAULT_OMEGA_N: f64 = 4.0;

/// Default K_D sweep horizon [s] and sample count
pub const DEFAULT_SWEEP_HORIZON: f64 = 2.0;
pub const DEFAULT_SWEEP_SAMPLES: usize = 2000;

/// Default PI damping sweep: fixed K_I, ζ from 0.01 to 4 in steps of 0.01
pub const DEFAULT_PI_KI: f64 = 1.0;
pub const DEFAULT_ZETA_START: f64 = 0.01;
pub const DEFAULT_ZETA_STOP: f64 = 4.0;
pub const DEFAULT_ZETA_STEP: f64 = 0.01;

/// Default PI damping sweep horizon [s] and sample count
pub const DEFAULT_PI_HORIZON: f64 = 20.0;
pub const DEFAULT_PI_SAMPLES: usize = 1000;
