//! Parameter sweeps over the closed loop
//!
//! A sweep evaluates one independent point per parameter value: design the
//! gains, simulate the step response, extract the metrics. A failure is kept
//! with its point and never stops the others. With `parallel` set, points are
//! split into contiguous chunks evaluated on scoped worker threads; the
//! outcomes are always returned in parameter order.

use serde::Serialize;
use std::fmt;

use crate::config::{Backend, DampingSweepConfig, SweepConfig};
use crate::error::{Result, TuningError};
use crate::gains::{pi_gains_for_damping, solve};
use crate::metrics::{extract_metrics, ResponseMetrics, StepMetrics};
use crate::model::ControllerGains;
use crate::simulate::{ClosedLoopModel, PiLoopParams, TimeGrid, Trajectory};

/// The quantity varied across a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepVariable {
    DerivativeGain,
    DampingRatio,
}

impl SweepVariable {
    pub fn symbol(&self) -> &'static str {
        match self {
            SweepVariable::DerivativeGain => "K_D",
            SweepVariable::DampingRatio => "ζ",
        }
    }

    /// Label used for plot legends and CSV columns, e.g. `K_D=3`
    pub fn label(&self, value: f64) -> String {
        format!("{}={}", self.symbol(), self.format_value(value))
    }

    /// Parameter value with the usual number of decimals, or in full when
    /// that would round it
    pub fn format_value(&self, value: f64) -> String {
        let decimals = match self {
            SweepVariable::DerivativeGain => 0,
            SweepVariable::DampingRatio => 2,
        };
        let scale = 10f64.powi(decimals as i32);
        if ((value * scale).round() - value * scale).abs() < 1e-9 {
            format!("{value:.decimals$}")
        } else {
            format!("{value}")
        }
    }
}

/// Everything computed for one successful sweep point
#[derive(Debug, Clone, Serialize)]
pub struct SweepPoint {
    pub gains: ControllerGains,
    pub metrics: StepMetrics,
    pub trajectory: Trajectory,
    /// False if the closed loop has a pole in the right half plane
    pub stable: bool,
}

impl SweepPoint {
    pub fn response_metrics(&self) -> ResponseMetrics {
        ResponseMetrics {
            gains: self.gains,
            metrics: self.metrics,
        }
    }
}

/// Parameter value together with its point or the error that stopped it
#[derive(Debug)]
pub struct SweepOutcome {
    pub parameter: f64,
    pub result: Result<SweepPoint>,
}

/// Ordered outcomes of a sweep
#[derive(Debug)]
pub struct SweepReport {
    pub variable: SweepVariable,
    /// Relative settling band the metrics were extracted with
    pub tolerance: f64,
    pub outcomes: Vec<SweepOutcome>,
}

impl SweepReport {
    /// Successful points with their parameter values
    pub fn points(&self) -> impl Iterator<Item = (f64, &SweepPoint)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|p| (o.parameter, p)))
    }

    /// Failed points with their errors
    pub fn failures(&self) -> impl Iterator<Item = (f64, &TuningError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.parameter, e)))
    }

    /// Labelled trajectories of the successful points, for an external plotter
    pub fn labelled_trajectories(&self) -> Vec<(String, &Trajectory)> {
        self.points()
            .map(|(value, point)| (self.variable.label(value), &point.trajectory))
            .collect()
    }

    pub fn metrics(&self) -> Vec<ResponseMetrics> {
        self.points().map(|(_, p)| p.response_metrics()).collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let band = self.tolerance * 100.0;
        writeln!(
            f,
            "{:>4}  {:>8}  {:>8}  {:>6}   t_s({band}%) [s]",
            self.variable.symbol(),
            "K_P",
            "K_I",
            "%OS"
        )?;
        for outcome in &self.outcomes {
            let value = format!("{:>4}", self.variable.format_value(outcome.parameter));
            match &outcome.result {
                Ok(point) => writeln!(
                    f,
                    "{value}  {:8.2}  {:8.2}  {:6.2}   {}{}",
                    point.gains.kp(),
                    point.gains.ki(),
                    point.metrics.overshoot_percent,
                    point.metrics.settling,
                    if point.stable { "" } else { "  (unstable)" }
                )?,
                Err(err) => writeln!(f, "{value}  failed: {err}")?,
            }
        }
        Ok(())
    }
}

/// Sweep K_D at fixed target poles, re-solving K_P and K_I for every value
pub fn run_sweep(config: &SweepConfig) -> Result<SweepReport> {
    config.validate()?;
    let grid = config.time_grid()?;

    log::info!(
        "sweeping {} K_D values at ω_n={}, ζ={} ({:?} backend)",
        config.kd_values.len(),
        config.target.omega_n(),
        config.target.zeta(),
        config.backend
    );

    let outcomes = evaluate_all(&config.kd_values, config.parallel, |kd| {
        evaluate_kd(kd, config, &grid)
    });

    let report = SweepReport {
        variable: SweepVariable::DerivativeGain,
        tolerance: config.tolerance,
        outcomes,
    };
    log_summary(&report);
    Ok(report)
}

fn evaluate_kd(kd: f64, config: &SweepConfig, grid: &TimeGrid) -> Result<SweepPoint> {
    let gains = solve(&config.target, &config.plant, kd)?;
    let model = match config.backend {
        Backend::Linear => ClosedLoopModel::linear(&gains, &config.plant)?,
        Backend::Integrated => {
            ClosedLoopModel::integrated_with(&gains, &config.plant, config.integration)?
        }
    };
    evaluate_model(gains, &model, grid, config.target_value, config.tolerance)
}

/// Sweep the PI damping ratio at a fixed K_I using the integrated loop
pub fn run_damping_sweep(config: &DampingSweepConfig) -> Result<SweepReport> {
    config.validate()?;
    let grid = config.time_grid()?;
    let zetas = config.zeta.values()?;

    log::info!(
        "sweeping {} damping ratios at K_I={} over {} samples",
        zetas.len(),
        config.ki,
        grid.len()
    );

    let outcomes = evaluate_all(&zetas, config.parallel, |zeta| {
        evaluate_zeta(zeta, config, &grid)
    });

    let report = SweepReport {
        variable: SweepVariable::DampingRatio,
        tolerance: config.tolerance,
        outcomes,
    };
    log_summary(&report);
    Ok(report)
}

fn evaluate_zeta(zeta: f64, config: &DampingSweepConfig, grid: &TimeGrid) -> Result<SweepPoint> {
    let gains = pi_gains_for_damping(zeta, config.ki, &config.plant)?;
    let mut params = PiLoopParams::new(gains.kp(), gains.ki(), config.plant)?;
    params.saturation = config.saturation;
    let model = ClosedLoopModel::NonlinearIntegrated {
        params,
        options: config.integration,
    };
    evaluate_model(gains, &model, grid, config.target_value, config.tolerance)
}

fn evaluate_model(
    gains: ControllerGains,
    model: &ClosedLoopModel,
    grid: &TimeGrid,
    target_value: f64,
    tolerance: f64,
) -> Result<SweepPoint> {
    let stable = model.is_stable();
    if !stable {
        log::warn!("closed loop with {gains} is unstable");
    }
    let trajectory = model.step_response(grid)?;
    let metrics = extract_metrics(&trajectory, target_value, tolerance)?;
    log::debug!(
        "{gains}: overshoot {:.2}%, settling {}",
        metrics.overshoot_percent,
        metrics.settling
    );
    Ok(SweepPoint {
        gains,
        metrics,
        trajectory,
        stable,
    })
}

/// Evaluate every parameter, in order, optionally on scoped worker threads
fn evaluate_all<F>(parameters: &[f64], parallel: bool, eval: F) -> Vec<SweepOutcome>
where
    F: Fn(f64) -> Result<SweepPoint> + Sync,
{
    let outcome = |parameter: f64| SweepOutcome {
        parameter,
        result: eval(parameter),
    };

    let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
    if !parallel || workers < 2 || parameters.len() < 2 {
        return parameters.iter().map(|&p| outcome(p)).collect();
    }

    let chunk_size = parameters.len().div_ceil(workers);
    log::debug!(
        "evaluating {} points on {} workers",
        parameters.len(),
        parameters.len().div_ceil(chunk_size)
    );

    let outcome = &outcome;
    let scoped = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = parameters
            .chunks(chunk_size)
            .map(|chunk| {
                let handle =
                    scope.spawn(move |_| chunk.iter().map(|&p| outcome(p)).collect::<Vec<_>>());
                (chunk, handle)
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|(chunk, handle)| {
                handle.join().unwrap_or_else(|_| {
                    log::error!("sweep worker panicked on a chunk of {} points", chunk.len());
                    chunk.iter().map(|&p| panicked(p)).collect()
                })
            })
            .collect::<Vec<_>>()
    });

    scoped.unwrap_or_else(|_| parameters.iter().map(|&p| panicked(p)).collect())
}

fn panicked(parameter: f64) -> SweepOutcome {
    SweepOutcome {
        parameter,
        result: Err(TuningError::WorkerPanicked(parameter)),
    }
}

fn log_summary(report: &SweepReport) {
    let failed = report.failures().count();
    for (parameter, err) in report.failures() {
        log::warn!("{}: {err}", report.variable.label(parameter));
    }
    log::info!(
        "sweep finished: {} of {} points succeeded",
        report.len() - failed,
        report.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Settling;
    use crate::model::PlantParameters;

    fn small_config() -> SweepConfig {
        SweepConfig {
            kd_values: vec![0.0, 2.0, 5.0],
            ..SweepConfig::default()
        }
    }

    #[test]
    fn test_sweep_in_order() {
        let report = run_sweep(&small_config()).unwrap();
        let parameters: Vec<f64> = report.outcomes.iter().map(|o| o.parameter).collect();
        assert_eq!(parameters, vec![0.0, 2.0, 5.0]);
        assert_eq!(report.points().count(), 3);
        assert!(report.points().all(|(_, p)| p.stable && p.metrics.settling.is_settled()));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let serial = run_sweep(&small_config()).unwrap();
        let parallel = run_sweep(&SweepConfig {
            parallel: true,
            ..small_config()
        })
        .unwrap();

        for ((a_kd, a), (b_kd, b)) in serial.points().zip(parallel.points()) {
            assert_eq!(a_kd, b_kd);
            assert_eq!(a.gains, b.gains);
            assert_eq!(a.metrics, b.metrics);
        }
    }

    #[test]
    fn test_failure_is_local() {
        let config = SweepConfig {
            kd_values: vec![1.0, -1.0, 3.0],
            ..SweepConfig::default()
        };
        let report = run_sweep(&config).unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(report.points().count(), 2);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, -1.0);
        assert!(matches!(failures[0].1, TuningError::InvalidInput(_)));

        let table = report.to_string();
        assert!(table.contains("failed"));
    }

    #[test]
    fn test_zero_gain_plant_fails_every_point() {
        let config = SweepConfig {
            plant: PlantParameters::new(0.0, 1.0).unwrap(),
            ..small_config()
        };
        let report = run_sweep(&config).unwrap();
        assert!(report
            .failures()
            .all(|(_, e)| matches!(e, TuningError::DegenerateConfiguration(_))));
        assert_eq!(report.failures().count(), 3);
    }

    #[test]
    fn test_table_layout() {
        let report = run_sweep(&SweepConfig {
            kd_values: vec![0.0],
            ..SweepConfig::default()
        })
        .unwrap();
        let table = report.to_string();
        let mut lines = table.lines();
        assert_eq!(lines.next().unwrap(), " K_D       K_P       K_I     %OS   t_s(2%) [s]");
        let row = lines.next().unwrap();
        assert!(row.starts_with("   0      7.00     16.00    7.27   "), "{row}");
    }

    #[test]
    fn test_unsettled_shows_dash() {
        // Horizon too short for the loop to enter the band
        let config = SweepConfig {
            kd_values: vec![0.0],
            grid: crate::config::GridConfig {
                start: 0.0,
                stop: 0.2,
                samples: 50,
            },
            ..SweepConfig::default()
        };
        let report = run_sweep(&config).unwrap();
        let (_, point) = report.points().next().unwrap();
        assert_eq!(point.metrics.settling, Settling::Unsettled);
        assert!(report.to_string().lines().nth(1).unwrap().ends_with('—'));
    }

    #[test]
    fn test_damping_sweep() {
        let config = DampingSweepConfig {
            zeta: crate::config::ParameterRange {
                start: 0.5,
                stop: 2.0,
                step: 0.5,
            },
            ..DampingSweepConfig::default()
        };
        let report = run_damping_sweep(&config).unwrap();
        assert_eq!(report.variable, SweepVariable::DampingRatio);
        assert_eq!(report.len(), 3);

        let overshoot: Vec<f64> = report
            .points()
            .map(|(_, p)| p.metrics.overshoot_percent)
            .collect();
        // ζ = 0.5 leaves K_P = 0 and T(s) = 1/(s² + s + 1): about 16% overshoot.
        // At ζ = 1 the zero cancels a pole, T(s) = 1/(s + 1).
        assert!(overshoot[0] > 15.0);
        assert!(overshoot[1] < 0.5);
        assert!(overshoot[2] < 0.5);
        assert!(report.points().all(|(_, p)| p.trajectory.signals().is_some()));

        let labels: Vec<String> = report
            .labelled_trajectories()
            .into_iter()
            .map(|(l, _)| l)
            .collect();
        assert_eq!(labels, vec!["ζ=0.50", "ζ=1.00", "ζ=1.50"]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(SweepVariable::DerivativeGain.label(3.0), "K_D=3");
        assert_eq!(SweepVariable::DerivativeGain.label(0.25), "K_D=0.25");
        assert_eq!(SweepVariable::DampingRatio.label(0.7), "ζ=0.70");
        assert_eq!(SweepVariable::DampingRatio.label(0.01 + 6.0 * 0.01), "ζ=0.07");
        assert_eq!(SweepVariable::DampingRatio.label(0.125), "ζ=0.125");
    }

    #[test]
    fn test_fractional_kd_rows_stay_distinct() {
        let report = run_sweep(&SweepConfig {
            kd_values: vec![0.25, 0.5, 0.75],
            ..SweepConfig::default()
        })
        .unwrap();

        let labels: Vec<String> = report
            .labelled_trajectories()
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        assert_eq!(labels, vec!["K_D=0.25", "K_D=0.5", "K_D=0.75"]);

        let table = report.to_string();
        let column: Vec<&str> = table
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .collect();
        assert_eq!(column, vec!["0.25", "0.5", "0.75"]);
    }
}
