//! K_D and damping sweeps end to end, including export

use approx::assert_relative_eq;
use polesim::config::{Backend, DampingSweepConfig, ParameterRange, SweepConfig};
use polesim::persistence::write_trajectories_csv;
use polesim::simulate::Saturation;
use polesim::solvers::IntegrationOptions;
use polesim::sweep::{run_damping_sweep, run_sweep, SweepVariable};
use polesim::TuningError;

#[test]
fn test_default_sweep_table() {
    let report = run_sweep(&SweepConfig::default()).unwrap();
    assert_eq!(report.variable, SweepVariable::DerivativeGain);
    assert_eq!(report.len(), 11);
    assert_eq!(report.failures().count(), 0);

    let table = report.to_string();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 12);
    assert!(lines[0].contains("t_s(2%) [s]"));
    assert!(lines[11].starts_with("  10     87.00    176.00   12.92   1.3"), "{}", lines[11]);
    assert!(!table.contains('—'));

    let kps: Vec<f64> = report.points().map(|(_, p)| p.gains.kp()).collect();
    assert!(kps.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn test_parallel_sweep_matches_serial_and_exports() {
    let serial = run_sweep(&SweepConfig::default()).unwrap();
    let parallel = run_sweep(&SweepConfig {
        parallel: true,
        ..SweepConfig::default()
    })
    .unwrap();
    assert_eq!(serial.to_string(), parallel.to_string());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kd_sweep.csv");
    write_trajectories_csv(&path, &parallel.labelled_trajectories()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("time [s],K_D=0,K_D=1,"));
    assert!(header.ends_with(",K_D=10"));
    assert_eq!(lines.count(), 2000);
}

#[test]
fn test_failures_stay_with_their_points() {
    let config = SweepConfig {
        kd_values: vec![0.0, f64::NAN, -2.0, 4.0],
        ..SweepConfig::default()
    };
    let report = run_sweep(&config).unwrap();
    assert_eq!(report.len(), 4);
    assert_eq!(report.points().count(), 2);
    assert!(report
        .failures()
        .all(|(_, e)| matches!(e, TuningError::InvalidInput(_))));

    let table = report.to_string();
    assert_eq!(table.lines().filter(|l| l.contains("failed")).count(), 2);
}

#[test]
fn test_divergence_is_reported_per_point() {
    let config = SweepConfig {
        kd_values: vec![0.0, 1.0],
        backend: Backend::Integrated,
        integration: IntegrationOptions {
            max_steps: 10,
            ..IntegrationOptions::default()
        },
        ..SweepConfig::default()
    };
    let report = run_sweep(&config).unwrap();
    assert_eq!(report.points().count(), 0);
    for (_, err) in report.failures() {
        match err {
            TuningError::NumericalDivergence { time, .. } => assert!(*time < 2.0),
            other => panic!("expected divergence, got {other:?}"),
        }
    }
}

#[test]
fn test_integrated_backend_tracks_designed_derivative() {
    let linear = SweepConfig {
        kd_values: vec![0.0, 10.0],
        ..SweepConfig::default()
    };
    let integrated = SweepConfig {
        backend: Backend::Integrated,
        integration: IntegrationOptions::with_tolerances(1e-10, 1e-10),
        ..linear.clone()
    };
    let a = run_sweep(&linear).unwrap();
    let b = run_sweep(&integrated).unwrap();
    assert_eq!(b.failures().count(), 0);

    let step = linear.time_grid().unwrap().as_slice()[1];
    for ((kd, pa), (_, pb)) in a.points().zip(b.points()) {
        assert_eq!(pa.gains, pb.gains);
        assert!(pb.stable);
        assert_relative_eq!(
            pa.metrics.overshoot_percent,
            pb.metrics.overshoot_percent,
            epsilon = 1e-3
        );
        let (ta, tb) = (pa.metrics.settling.time().unwrap(), pb.metrics.settling.time().unwrap());
        assert!((ta - tb).abs() <= 1.5 * step, "K_D={kd}: {ta} vs {tb}");
    }
    let (_, last) = b.points().last().unwrap();
    assert_relative_eq!(last.metrics.overshoot_percent, 12.92, epsilon = 0.01);
}

#[test]
fn test_invalid_config_rejected_up_front() {
    let config = SweepConfig {
        kd_values: vec![],
        ..SweepConfig::default()
    };
    assert!(matches!(run_sweep(&config), Err(TuningError::InvalidInput(_))));
}

#[test]
fn test_saturated_damping_sweep() {
    let config = DampingSweepConfig {
        zeta: ParameterRange {
            start: 0.25,
            stop: 1.0,
            step: 0.25,
        },
        saturation: Some(Saturation::new(0.0, 1.5).unwrap()),
        parallel: true,
        ..DampingSweepConfig::default()
    };
    let report = run_damping_sweep(&config).unwrap();
    assert_eq!(report.len(), 3);

    for (_, point) in report.points() {
        let control = &point.trajectory.signals().unwrap().control;
        assert!(control.iter().all(|&u| (0.0..=1.5).contains(&u)));
        assert!(point.metrics.overshoot_percent >= 0.0);
    }
}
