//! CSV and NumPy array files for logged telemetry and simulated trajectories
//!
//! # CSV Formats
//!
//! Closed-loop samples:
//!
//! ```csv
//! Time (s),Target RTD,Measured RTD,PWM (%)
//! 0.05,150.0,101.2,100.0
//! ```
//!
//! Identification rounds:
//!
//! ```csv
//! time_s,adc,resistance_ohm,control_u,cycle
//! 0.52,1873,108.42,1,12
//! ```
//!
//! Simulated trajectories share one time column:
//!
//! ```csv
//! time [s],K_D=0,K_D=1,...
//! ```
//!
//! # NPY Format
//!
//! Version 1.0 files holding a C-ordered, little-endian `f64` matrix with one
//! row per sample, readable with `numpy.load`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, TuningError};
use crate::simulate::Trajectory;
use crate::telemetry::{ControlSample, TelemetryRecord};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGNMENT: usize = 64;

/// Write closed-loop samples with the `Time (s),Target RTD,...` header
pub fn write_control_csv(path: impl AsRef<Path>, samples: &[ControlSample]) -> Result<()> {
    write_records(path.as_ref(), samples)
}

/// Read closed-loop samples written by [`write_control_csv`]
pub fn read_control_csv(path: impl AsRef<Path>) -> Result<Vec<ControlSample>> {
    read_records(path.as_ref())
}

/// Write identification rounds with the `time_s,adc,...` header
pub fn write_telemetry_csv(path: impl AsRef<Path>, records: &[TelemetryRecord]) -> Result<()> {
    write_records(path.as_ref(), records)
}

pub fn read_telemetry_csv(path: impl AsRef<Path>) -> Result<Vec<TelemetryRecord>> {
    read_records(path.as_ref())
}

fn write_records<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    log::debug!("wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let records = rdr.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(records)
}

/// Closed-loop samples as an (n, 4) array: time, target, measured, control
pub fn write_control_npy(path: impl AsRef<Path>, samples: &[ControlSample]) -> Result<()> {
    let data: Vec<f64> = samples.iter().flat_map(|s| s.to_row()).collect();
    save_npy(path.as_ref(), &data, (samples.len(), 4))
}

/// Identification rounds as an (n, 5) array: time, adc, resistance, control, cycle
pub fn write_telemetry_npy(path: impl AsRef<Path>, records: &[TelemetryRecord]) -> Result<()> {
    let data: Vec<f64> = records
        .iter()
        .flat_map(|r| {
            [
                r.elapsed,
                r.raw_code as f64,
                r.value,
                r.control as f64,
                r.sequence as f64,
            ]
        })
        .collect();
    save_npy(path.as_ref(), &data, (records.len(), 5))
}

fn save_npy(path: &Path, data: &[f64], shape: (usize, usize)) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_npy(&mut writer, data, shape)?;
    writer.flush()?;
    log::debug!("wrote {}x{} array to {}", shape.0, shape.1, path.display());
    Ok(())
}

/// Write a row-major `f64` matrix in NPY v1.0 format
pub fn write_npy<W: Write>(writer: &mut W, data: &[f64], shape: (usize, usize)) -> Result<()> {
    if data.len() != shape.0 * shape.1 {
        return Err(TuningError::invalid(format!(
            "array of {} values does not have shape ({}, {})",
            data.len(),
            shape.0,
            shape.1
        )));
    }

    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        shape.0, shape.1
    );
    // magic + version + u16 length + header + '\n' is padded to the alignment
    let preamble = NPY_MAGIC.len() + 2 + 2;
    let unpadded = preamble + header.len() + 1;
    let padding = (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| TuningError::invalid("NPY header too long"))?;

    writer.write_all(NPY_MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for value in data {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Read a 2-D `<f8` NPY v1.0 array, returning the values and the shape
pub fn read_npy<R: Read>(reader: &mut R) -> Result<(Vec<f64>, (usize, usize))> {
    let mut preamble = [0u8; 10];
    reader.read_exact(&mut preamble)?;
    if &preamble[..6] != NPY_MAGIC || preamble[6] != 1 {
        return Err(TuningError::invalid("not an NPY v1.x file"));
    }
    let header_len = u16::from_le_bytes([preamble[8], preamble[9]]) as usize;

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8_lossy(&header);
    if !header.contains("'descr': '<f8'") || !header.contains("'fortran_order': False") {
        return Err(TuningError::invalid(format!(
            "unsupported NPY layout: {}",
            header.trim()
        )));
    }
    let shape = parse_shape(&header)?;

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.len() != shape.0 * shape.1 * 8 {
        return Err(TuningError::invalid(format!(
            "NPY payload has {} bytes, expected {}",
            bytes.len(),
            shape.0 * shape.1 * 8
        )));
    }
    let data = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    Ok((data, shape))
}

pub fn load_npy(path: impl AsRef<Path>) -> Result<(Vec<f64>, (usize, usize))> {
    let mut reader = BufReader::new(File::open(path)?);
    read_npy(&mut reader)
}

fn parse_shape(header: &str) -> Result<(usize, usize)> {
    let bad = || TuningError::invalid(format!("cannot read NPY shape from {}", header.trim()));
    let start = header.find("'shape': (").ok_or_else(bad)? + "'shape': (".len();
    let end = start + header[start..].find(')').ok_or_else(bad)?;
    let dims: Vec<usize> = header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse().map_err(|_| bad()))
        .collect::<Result<_>>()?;
    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(bad()),
    }
}

/// Export labelled trajectories on a shared time grid
///
/// # Errors
///
/// `InvalidInput` if the trajectories are not sampled on identical times.
pub fn write_trajectories_csv(
    path: impl AsRef<Path>,
    series: &[(String, &Trajectory)],
) -> Result<()> {
    let Some((_, first)) = series.first() else {
        return Err(TuningError::invalid("no trajectories to export"));
    };
    if series.iter().any(|(_, t)| t.time() != first.time()) {
        return Err(TuningError::invalid("trajectories must share one time grid"));
    }

    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    let mut header = vec!["time [s]".to_string()];
    header.extend(series.iter().map(|(label, _)| label.clone()));
    wtr.write_record(&header)?;

    for (i, time) in first.time().iter().enumerate() {
        let mut record = vec![time.to_string()];
        record.extend(series.iter().map(|(_, t)| t.output()[i].to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    log::info!(
        "exported {} trajectories to {}",
        series.len(),
        path.as_ref().display()
    );
    Ok(())
}
