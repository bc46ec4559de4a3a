//! polesim command line
//!
//! ```text
//! polesim sweep --parallel --export sweep.csv
//! polesim pi --ki 1 --zeta-start 0.5 --zeta-stop 2 --zeta-step 0.5
//! polesim poles --omega-n 1
//! polesim design --omega-n 4 --zeta 1 --kd 2
//! polesim log --input /dev/ttyACM0 --start --duration 60 --csv rtd_log.csv --npy rtd_log.npy
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use polesim::config::{Backend, DampingSweepConfig, ParameterRange, SweepConfig};
use polesim::gains::{omega_n_for_settling_time, solve};
use polesim::metrics::extract_metrics;
use polesim::model::{PlantParameters, TargetPoles};
use polesim::persistence;
use polesim::poles::pole_locus;
use polesim::simulate::{closed_loop_transfer_function, Saturation};
use polesim::sweep::{run_damping_sweep, run_sweep, SweepReport};
use polesim::telemetry::{
    ingest, measured_trajectory, open_source, send_start, spawn_reader, ControlSample,
    TelemetryLine, TelemetryLog, TelemetryRecord, DEVICE_BAUD_RATE, DEVICE_READ_TIMEOUT,
};

#[derive(Parser, Debug)]
#[command(name = "polesim")]
#[command(
    about = "Pole-placement tuning and step-response analysis for a first-order heater loop"
)]
#[command(version)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Linear,
    Integrated,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Linear => Backend::Linear,
            BackendArg::Integrated => Backend::Integrated,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LineFormat {
    /// `round=<n>, adc=<n>, rtd=<f>, u=<n>, t_off=<n>`
    Round,
    /// `target,measured,pwm`
    Control,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep K_D at fixed closed-loop poles
    Sweep {
        /// JSON sweep configuration (defaults are used for missing fields)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Evaluate points on worker threads
        #[arg(short, long)]
        parallel: bool,

        /// Simulation backend, overriding the configuration
        #[arg(short, long, value_enum)]
        backend: Option<BackendArg>,

        /// Write all trajectories to this CSV file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Sweep the PI damping ratio at fixed K_I with the integrated loop
    Pi {
        /// JSON damping sweep configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Integral gain
        #[arg(long)]
        ki: Option<f64>,

        #[arg(long)]
        zeta_start: Option<f64>,

        #[arg(long)]
        zeta_stop: Option<f64>,

        #[arg(long)]
        zeta_step: Option<f64>,

        /// Lower and upper control limits
        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
        saturation: Option<Vec<f64>>,

        #[arg(short, long)]
        parallel: bool,

        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// List second-order pole locations over a range of damping ratios
    Poles {
        #[arg(long, default_value = "1.0")]
        omega_n: f64,

        #[arg(long, default_value = "0.0")]
        zeta_start: f64,

        #[arg(long, default_value = "3.0")]
        zeta_stop: f64,

        #[arg(long, default_value = "0.25")]
        zeta_step: f64,
    },

    /// Design gains for one operating point
    Design {
        /// Plant gain
        #[arg(short, long, default_value = "1.0")]
        k: f64,

        /// Plant time constant [s]
        #[arg(short, long, default_value = "1.0")]
        tau: f64,

        /// Natural frequency [rad/s]
        #[arg(long, default_value = "4.0", conflicts_with = "settling_time")]
        omega_n: f64,

        /// Derive ω_n from a 2% settling time [s] instead
        #[arg(long)]
        settling_time: Option<f64>,

        #[arg(long, default_value = "1.0")]
        zeta: f64,

        #[arg(long, default_value = "0.0")]
        kd: f64,
    },

    /// Capture device telemetry and persist it to CSV and NPY
    Log {
        /// Serial device or capture file to read
        #[arg(short, long)]
        input: PathBuf,

        /// Serial baud rate
        #[arg(long, default_value_t = DEVICE_BAUD_RATE)]
        baud: u32,

        #[arg(short, long, value_enum, default_value = "control")]
        format: LineFormat,

        /// Send the start command before reading
        #[arg(long)]
        start: bool,

        /// Stop after this many seconds instead of at end of stream
        #[arg(short, long)]
        duration: Option<f64>,

        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long)]
        npy: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    match args.command {
        Command::Sweep {
            config,
            parallel,
            backend,
            export,
        } => {
            let mut config = match config {
                Some(path) => SweepConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => SweepConfig::default(),
            };
            config.parallel |= parallel;
            if let Some(backend) = backend {
                config.backend = backend.into();
            }

            let report = run_sweep(&config)?;
            print!("{report}");
            export_report(&report, export.as_deref())?;
        }

        Command::Pi {
            config,
            ki,
            zeta_start,
            zeta_stop,
            zeta_step,
            saturation,
            parallel,
            export,
        } => {
            let mut config = match config {
                Some(path) => DampingSweepConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => DampingSweepConfig::default(),
            };
            if let Some(ki) = ki {
                config.ki = ki;
            }
            config.zeta = ParameterRange {
                start: zeta_start.unwrap_or(config.zeta.start),
                stop: zeta_stop.unwrap_or(config.zeta.stop),
                step: zeta_step.unwrap_or(config.zeta.step),
            };
            if let Some(limits) = saturation {
                config.saturation = Some(Saturation::new(limits[0], limits[1])?);
            }
            config.parallel |= parallel;

            let report = run_damping_sweep(&config)?;
            print!("{report}");
            export_report(&report, export.as_deref())?;
        }

        Command::Poles {
            omega_n,
            zeta_start,
            zeta_stop,
            zeta_step,
        } => {
            let mut zetas = ParameterRange {
                start: zeta_start,
                stop: zeta_stop,
                step: zeta_step,
            }
            .values()?;
            // Include the upper bound itself
            if zetas.last().map_or(true, |&z| z < zeta_stop) {
                zetas.push(zeta_stop);
            }

            println!("{:>6}  poles (ω_n = {omega_n})", "ζ");
            for (zeta, geometry) in pole_locus(omega_n, &zetas)? {
                println!("{zeta:6.3}  {geometry}");
            }
        }

        Command::Design {
            k,
            tau,
            omega_n,
            settling_time,
            zeta,
            kd,
        } => {
            let plant = PlantParameters::new(k, tau)?;
            let omega_n = match settling_time {
                Some(ts) => omega_n_for_settling_time(ts)?,
                None => omega_n,
            };
            let target = TargetPoles::new(omega_n, zeta)?;
            let gains = solve(&target, &plant, kd)?;
            let tf = closed_loop_transfer_function(&gains, &plant)?;

            println!("{gains}");
            println!("T(s) = {tf}");
            let poles: Vec<String> = tf.poles().iter().map(|p| format!("{p:.4}")).collect();
            println!("poles: {}", poles.join(", "));
        }

        Command::Log {
            input,
            baud,
            format,
            start,
            duration,
            csv,
            npy,
        } => match format {
            LineFormat::Round => {
                let records: Vec<TelemetryRecord> = capture(&input, baud, start, duration)?;
                if let Some(path) = &csv {
                    persistence::write_telemetry_csv(path, &records)?;
                }
                if let Some(path) = &npy {
                    persistence::write_telemetry_npy(path, &records)?;
                }
            }
            LineFormat::Control => {
                let samples: Vec<ControlSample> = capture(&input, baud, start, duration)?;
                if let Some(path) = &csv {
                    persistence::write_control_csv(path, &samples)?;
                }
                if let Some(path) = &npy {
                    persistence::write_control_npy(path, &samples)?;
                }
                summarize_control(&samples);
            }
        },
    }

    Ok(())
}

fn export_report(report: &SweepReport, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let series = report.labelled_trajectories();
    if series.is_empty() {
        bail!("no successful sweep points to export");
    }
    persistence::write_trajectories_csv(path, &series)?;
    Ok(())
}

/// Read telemetry from `input` until end of stream or `duration` elapses
fn capture<T>(input: &Path, baud: u32, start: bool, duration: Option<f64>) -> Result<Vec<T>>
where
    T: TelemetryLine + Clone + Send + Sync + 'static,
{
    let mut device = open_source(input, baud, DEVICE_READ_TIMEOUT)
        .with_context(|| format!("opening {}", input.display()))?;
    if start {
        if device.is_serial() {
            send_start(&mut device).context("sending start command")?;
            info!("start command sent to {}", input.display());
        } else {
            warn!("{} is a capture file, not sending start", input.display());
        }
    }

    let log = TelemetryLog::new();
    let stats = match duration {
        Some(seconds) => {
            if !(seconds.is_finite() && seconds >= 0.0) {
                bail!("capture duration must be non-negative seconds, got {seconds}");
            }
            let stop = Arc::new(AtomicBool::new(false));
            let handle = spawn_reader(device, log.clone(), Arc::clone(&stop));
            std::thread::sleep(Duration::from_secs_f64(seconds));
            stop.store(true, Ordering::Relaxed);
            match handle.join() {
                Ok(result) => result?,
                Err(_) => bail!("telemetry reader panicked"),
            }
        }
        None => ingest(device, &log, &AtomicBool::new(false))?,
    };

    info!(
        "captured {} records from {} lines ({} unparsable)",
        stats.records, stats.lines, stats.parse_errors
    );
    Ok(log.snapshot())
}

/// Print step metrics of a captured run, warning when none can be computed
fn summarize_control(samples: &[ControlSample]) {
    let Some(last) = samples.last() else {
        return;
    };
    if last.target == 0.0 {
        return;
    }
    let metrics = measured_trajectory(samples).and_then(|trajectory| {
        extract_metrics(&trajectory, last.target, polesim::utils::SETTLING_TOLERANCE)
    });
    match metrics {
        Ok(metrics) => println!(
            "overshoot {:.2}%, settling {} s (target {})",
            metrics.overshoot_percent, metrics.settling, last.target
        ),
        Err(e) => warn!("no step metrics for this capture: {e}"),
    }
}
