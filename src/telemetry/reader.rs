//! Producer thread turning a device byte stream into log records

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::{TelemetryLine, TelemetryLog};

/// Command that starts streaming on the firmware
pub const START_COMMAND: &[u8] = b"start\n";

/// Counters kept by a reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub lines: usize,
    pub records: usize,
    pub ignored: usize,
    pub parse_errors: usize,
}

/// Ask the firmware to start streaming
pub fn send_start<W: Write>(device: &mut W) -> io::Result<()> {
    device.write_all(START_COMMAND)?;
    device.flush()
}

/// Read lines from `source` into `log` until end of stream or `stop` is set
///
/// Records are stamped with the seconds elapsed since the call. Undecodable
/// lines are logged and skipped; read timeouts are retried.
pub fn ingest<R, T>(source: R, log: &TelemetryLog<T>, stop: &AtomicBool) -> io::Result<ReaderStats>
where
    R: Read,
    T: TelemetryLine,
{
    let started = Instant::now();
    let mut reader = BufReader::new(source);
    let mut stats = ReaderStats::default();
    let mut buffer = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        // A timeout may leave a partial line in `buffer`; the next read completes it
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(e),
        }

        stats.lines += 1;
        let line = String::from_utf8_lossy(&buffer);
        match T::parse_line(&line, started.elapsed().as_secs_f64()) {
            Ok(Some(record)) => {
                log.push(record);
                stats.records += 1;
            }
            Ok(None) => stats.ignored += 1,
            Err(e) => {
                log::warn!("skipping telemetry line {:?}: {e}", line.trim());
                stats.parse_errors += 1;
            }
        }
        buffer.clear();
    }

    log::debug!(
        "telemetry reader stopped after {} lines ({} records, {} errors)",
        stats.lines,
        stats.records,
        stats.parse_errors
    );
    Ok(stats)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Run [`ingest`] on a dedicated thread
///
/// Set `stop` to end the reader after its current line; join the handle to
/// get its counters back.
pub fn spawn_reader<R, T>(
    source: R,
    log: TelemetryLog<T>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<io::Result<ReaderStats>>
where
    R: Read + Send + 'static,
    T: TelemetryLine + Send + Sync + 'static,
{
    thread::spawn(move || ingest(source, &log, &stop))
}
