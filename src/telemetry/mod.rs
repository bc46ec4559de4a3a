//! Device telemetry: line decoding, a shared record log and a reader thread
//!
//! Readers consume any byte stream. [`open_source`] opens a serial device or
//! a capture file on disk.

mod device;
mod parse;
mod reader;
mod shared_log;

pub use device::{open_source, TelemetrySource, DEVICE_BAUD_RATE, DEVICE_READ_TIMEOUT};
pub use parse::{
    measured_trajectory, ControlSample, TelemetryLine, TelemetryParseError, TelemetryRecord,
    Timestamped,
};
pub use reader::{ingest, send_start, spawn_reader, ReaderStats, START_COMMAND};
pub use shared_log::TelemetryLog;
