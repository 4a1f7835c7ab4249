//! Dual-sink fan-out

use super::{AuditEntry, AuditOpenError, AuditSink, LineLogSink, TableSink};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Failure of a single sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkFailure {
    pub sink: &'static str,
    pub message: String,
}

/// At least one sink failed to persist an entry
#[derive(Debug, Clone, PartialEq, Error)]
#[error("audit write failed for {}", describe(.failures))]
pub struct AuditWriteError {
    pub failures: Vec<SinkFailure>,
}

fn describe(failures: &[SinkFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.sink, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes each entry to every sink, each behind its own lock
pub struct AuditRecorder {
    sinks: Vec<Mutex<Box<dyn AuditSink>>>,
}

impl AuditRecorder {
    /// Open the line log and table sinks
    pub fn open(
        log_path: impl AsRef<Path>,
        table_path: impl AsRef<Path>,
    ) -> Result<Self, AuditOpenError> {
        let log = LineLogSink::open(log_path.as_ref())?;
        let table = TableSink::open(table_path.as_ref())?;
        let sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(log), Box::new(table)];
        Ok(Self::with_sinks(sinks))
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            sinks: sinks.into_iter().map(Mutex::new).collect(),
        }
    }

    /// Append an entry to every sink.
    ///
    /// A failing sink does not stop the others; all failures are returned
    /// together.
    pub fn record(&self, entry: &AuditEntry) -> Result<(), AuditWriteError> {
        let mut failures = Vec::new();

        for sink in &self.sinks {
            let mut sink = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(e) = sink.append(entry) {
                warn!(sink = sink.name(), error = %e, "Audit sink write failed");
                failures.push(SinkFailure {
                    sink: sink.name(),
                    message: e.to_string(),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AuditWriteError { failures })
        }
    }
}
