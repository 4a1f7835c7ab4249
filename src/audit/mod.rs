//! Audit trail for served predictions
//!
//! Each successful prediction is appended to two independent sinks: a
//! human-readable line log and a CSV table with fixed columns
//! `timestamp,features,prediction`. Writes go through a single background
//! writer so that sink order follows request completion order, and sink
//! failures never reach the client.

mod recorder;
mod sinks;
mod writer;

pub use recorder::{AuditRecorder, AuditWriteError, SinkFailure};
pub use sinks::{read_table, AuditSink, LineLogSink, TableSink, TABLE_HEADER};
pub use writer::AuditWriter;

use crate::features::FeatureRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// One request/response pair as written to the sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Compact JSON of the validated features
    pub features: String,
    pub prediction: f64,
}

impl AuditEntry {
    pub fn new(timestamp: DateTime<Utc>, features: &FeatureRecord, prediction: f64) -> Self {
        Self {
            timestamp,
            features: features.to_json(),
            prediction,
        }
    }

    /// ISO-8601 UTC timestamp, lossless to the clock's precision
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// A sink could not be opened
#[derive(Debug, Error)]
#[error("Failed to open audit sink {path}: {source}")]
pub struct AuditOpenError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
