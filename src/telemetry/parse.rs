//! Line formats emitted by the heater firmware
//!
//! Identification firmware prints one line per control round:
//!
//! ```text
//! round=12, adc=1873, rtd=108.42, u=1, t_off=3
//! ```
//!
//! The closed-loop firmware prints `target,measured,pwm`:
//!
//! ```text
//! 150.0,108.4,62.5
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulate::Trajectory;

/// Why a telemetry line could not be decoded
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("expected field `{expected}`, found `{found}`")]
    UnexpectedField { expected: &'static str, found: String },

    #[error("field `{field}` has invalid value `{value}`")]
    InvalidValue { field: &'static str, value: String },
}

/// A record decodable from one line of device output
pub trait TelemetryLine: Sized {
    /// Decode `line` received `elapsed` seconds after the reader started
    ///
    /// `Ok(None)` means the line is not telemetry (banners, prompts, blank
    /// lines) and should be skipped silently.
    fn parse_line(line: &str, elapsed: f64) -> Result<Option<Self>, TelemetryParseError>;
}

/// Anything carrying a time stamp in seconds
pub trait Timestamped {
    fn timestamp(&self) -> f64;
}

/// One round of the identification firmware
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Seconds since the reader started
    #[serde(rename = "time_s")]
    pub elapsed: f64,
    /// Raw ADC code of the RTD divider
    #[serde(rename = "adc")]
    pub raw_code: i64,
    /// RTD resistance [Ω]
    #[serde(rename = "resistance_ohm")]
    pub value: f64,
    /// Heater command
    #[serde(rename = "control_u")]
    pub control: i64,
    /// Control round index
    #[serde(rename = "cycle")]
    pub sequence: u64,
    /// Heater off time reported by the firmware [s]
    #[serde(skip)]
    pub off_time: i64,
}

const ROUND_FIELDS: [&str; 5] = ["round", "adc", "rtd", "u", "t_off"];

fn field<'a>(part: &'a str, expected: &'static str) -> Result<&'a str, TelemetryParseError> {
    match part.trim().split_once('=') {
        Some((name, value)) if name.trim() == expected => Ok(value.trim()),
        _ => Err(TelemetryParseError::UnexpectedField {
            expected,
            found: part.trim().to_string(),
        }),
    }
}

fn number<T: std::str::FromStr>(
    value: &str,
    field: &'static str,
) -> Result<T, TelemetryParseError> {
    value.parse().map_err(|_| TelemetryParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

impl TelemetryLine for TelemetryRecord {
    fn parse_line(line: &str, elapsed: f64) -> Result<Option<Self>, TelemetryParseError> {
        let line = line.trim();
        if !line.starts_with("round=") {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() != ROUND_FIELDS.len() {
            return Err(TelemetryParseError::FieldCount {
                expected: ROUND_FIELDS.len(),
                found: parts.len(),
            });
        }

        let [round, adc, rtd, u, t_off] = ROUND_FIELDS;
        Ok(Some(TelemetryRecord {
            elapsed,
            sequence: number(field(parts[0], round)?, round)?,
            raw_code: number(field(parts[1], adc)?, adc)?,
            value: number(field(parts[2], rtd)?, rtd)?,
            control: number(field(parts[3], u)?, u)?,
            off_time: number(field(parts[4], t_off)?, t_off)?,
        }))
    }
}

impl Timestamped for TelemetryRecord {
    fn timestamp(&self) -> f64 {
        self.elapsed
    }
}

/// One sample of the closed-loop firmware
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlSample {
    #[serde(rename = "Time (s)")]
    pub time: f64,
    #[serde(rename = "Target RTD")]
    pub target: f64,
    #[serde(rename = "Measured RTD")]
    pub measured: f64,
    #[serde(rename = "PWM (%)")]
    pub control: f64,
}

impl ControlSample {
    pub fn to_row(&self) -> [f64; 4] {
        [self.time, self.target, self.measured, self.control]
    }
}

impl TelemetryLine for ControlSample {
    fn parse_line(line: &str, elapsed: f64) -> Result<Option<Self>, TelemetryParseError> {
        let line = line.trim();
        if line.is_empty() || !line.contains(',') {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() != 3 {
            return Err(TelemetryParseError::FieldCount {
                expected: 3,
                found: parts.len(),
            });
        }

        Ok(Some(ControlSample {
            time: elapsed,
            target: number(parts[0].trim(), "target")?,
            measured: number(parts[1].trim(), "measured")?,
            control: number(parts[2].trim(), "pwm")?,
        }))
    }
}

impl Timestamped for ControlSample {
    fn timestamp(&self) -> f64 {
        self.time
    }
}

/// Measured output of logged samples as a trajectory, for metric extraction
///
/// Samples must be in increasing time order, as a reader produces them.
pub fn measured_trajectory(samples: &[ControlSample]) -> crate::error::Result<Trajectory> {
    let time = samples.iter().map(|s| s.time).collect();
    let output = samples.iter().map(|s| s.measured).collect();
    Trajectory::new(time, output)
}
