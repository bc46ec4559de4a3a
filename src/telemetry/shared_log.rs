//! Append-only record log shared between a producer and its readers

use parking_lot::RwLock;
use std::sync::Arc;

use super::Timestamped;

/// Shared, append-only log of telemetry records
///
/// Clones share the same storage: hand one to the reader thread and keep one
/// for plotting or persistence.
#[derive(Debug)]
pub struct TelemetryLog<T> {
    records: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for TelemetryLog<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<T> Default for TelemetryLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TelemetryLog<T> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn push(&self, record: T) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Run `f` on the records under a read lock
    pub fn with_records<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.records.read())
    }
}

impl<T: Clone> TelemetryLog<T> {
    /// Copy of every record so far
    pub fn snapshot(&self) -> Vec<T> {
        self.records.read().clone()
    }

    pub fn latest(&self) -> Option<T> {
        self.records.read().last().cloned()
    }
}

impl<T: Clone + Timestamped> TelemetryLog<T> {
    /// Records within `span` seconds of the newest one
    pub fn window(&self, span: f64) -> Vec<T> {
        let records = self.records.read();
        let Some(newest) = records.last().map(Timestamped::timestamp) else {
            return Vec::new();
        };
        let start = (newest - span).max(0.0);
        let first = records.partition_point(|r| r.timestamp() < start);
        records[first..].to_vec()
    }
}
