//! Opening a telemetry source: a serial device or a capture file on disk

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

/// Baud rate the heater firmware streams at
pub const DEVICE_BAUD_RATE: u32 = 115_200;

/// Read timeout on serial devices; expired reads are retried by the reader
pub const DEVICE_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Byte stream feeding a telemetry reader
pub enum TelemetrySource {
    File(File),
    Serial(Box<dyn serialport::SerialPort>),
}

impl TelemetrySource {
    pub fn is_serial(&self) -> bool {
        matches!(self, TelemetrySource::Serial(_))
    }
}

impl std::fmt::Debug for TelemetrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetrySource::File(file) => f.debug_tuple("File").field(file).finish(),
            TelemetrySource::Serial(port) => f
                .debug_struct("Serial")
                .field("name", &port.name())
                .field("baud_rate", &port.baud_rate().ok())
                .finish(),
        }
    }
}

impl Read for TelemetrySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TelemetrySource::File(file) => file.read(buf),
            TelemetrySource::Serial(port) => port.read(buf),
        }
    }
}

impl Write for TelemetrySource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TelemetrySource::File(file) => file.write(buf),
            TelemetrySource::Serial(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TelemetrySource::File(file) => file.flush(),
            TelemetrySource::Serial(port) => port.flush(),
        }
    }
}

/// Open `path` for reading telemetry
///
/// Regular files are read as recorded captures. Anything else is opened as a
/// serial port at `baud_rate` with reads timing out after `timeout`.
pub fn open_source(path: &Path, baud_rate: u32, timeout: Duration) -> io::Result<TelemetrySource> {
    if std::fs::metadata(path)?.is_file() {
        return File::open(path).map(TelemetrySource::File);
    }

    let name = path.to_str().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("device path is not valid UTF-8: {}", path.display()),
        )
    })?;
    let port = serialport::new(name, baud_rate).timeout(timeout).open()?;
    log::info!("opened {name} at {baud_rate} baud");
    Ok(TelemetrySource::Serial(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{ingest, ControlSample, TelemetryLog};
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_capture_file_opens_as_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.txt");
        std::fs::write(&path, "25.0,24.5,120\n25.0,24.9,80\n").unwrap();

        let source = open_source(&path, DEVICE_BAUD_RATE, DEVICE_READ_TIMEOUT).unwrap();
        assert!(!source.is_serial());

        let log = TelemetryLog::<ControlSample>::new();
        let stats = ingest(source, &log, &AtomicBool::new(false)).unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(log.snapshot()[1].control, 80.0);
    }

    #[test]
    fn test_missing_device_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_source(&dir.path().join("ttyACM9"), DEVICE_BAUD_RATE, DEVICE_READ_TIMEOUT)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_directory_is_not_a_device() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_source(dir.path(), DEVICE_BAUD_RATE, DEVICE_READ_TIMEOUT).is_err());
    }
}
