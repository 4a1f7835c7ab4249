//! Fire-and-forget audit writer
//!
//! Requests hand entries to a dedicated writer thread over a bounded
//! channel and return immediately. The timestamp is taken under the same
//! lock as the enqueue, so rows land in completion order with
//! non-decreasing timestamps. When the queue is full (a stalled sink) the
//! entry is dropped and counted as an audit failure.

use super::{AuditEntry, AuditRecorder};
use crate::features::FeatureRecord;
use crate::metrics::MetricsRegistry;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Entries that may wait for the writer before new ones are dropped
pub const AUDIT_QUEUE_CAPACITY: usize = 10_000;

enum AuditCommand {
    Record(AuditEntry),
    Flush(oneshot::Sender<()>),
}

/// Handle for submitting entries to the background writer
pub struct AuditWriter {
    tx: Mutex<mpsc::Sender<AuditCommand>>,
    metrics: Arc<MetricsRegistry>,
}

impl AuditWriter {
    /// Start the writer thread with the default queue capacity.
    ///
    /// The thread exits once the writer is dropped and the queue is drained.
    pub fn spawn(
        recorder: Arc<AuditRecorder>,
        metrics: Arc<MetricsRegistry>,
    ) -> io::Result<(Self, JoinHandle<()>)> {
        Self::with_capacity(recorder, metrics, AUDIT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        recorder: Arc<AuditRecorder>,
        metrics: Arc<MetricsRegistry>,
        capacity: usize,
    ) -> io::Result<(Self, JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer_metrics = Arc::clone(&metrics);
        let handle = std::thread::Builder::new()
            .name("audit-writer".to_string())
            .spawn(move || drain(rx, recorder, writer_metrics))?;

        let writer = Self {
            tx: Mutex::new(tx),
            metrics,
        };
        Ok((writer, handle))
    }

    /// Stamp and enqueue an entry, returning the timestamp used
    pub fn submit(&self, features: &FeatureRecord, prediction: f64) -> DateTime<Utc> {
        let tx = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let timestamp = Utc::now();
        let entry = AuditEntry::new(timestamp, features, prediction);

        match tx.try_send(AuditCommand::Record(entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.metrics.increment_audit_failures();
                error!(timestamp = %timestamp, "Audit queue full, entry dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.increment_audit_failures();
                error!("Audit writer has stopped, entry dropped");
            }
        }
        timestamp
    }

    /// Wait until every entry submitted so far has been written
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if tx.send(AuditCommand::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

fn drain(
    mut rx: mpsc::Receiver<AuditCommand>,
    recorder: Arc<AuditRecorder>,
    metrics: Arc<MetricsRegistry>,
) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            AuditCommand::Record(entry) => {
                if let Err(e) = recorder.record(&entry) {
                    metrics.increment_audit_failures();
                    error!(
                        timestamp = %entry.timestamp_string(),
                        error = %e,
                        "Audit entry not fully persisted"
                    );
                }
            }
            AuditCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Audit writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{read_table, AuditSink, TableSink};
    use crate::features::validate;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn append(&mut self, _entry: &AuditEntry) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "read-only filesystem"))
        }
    }

    /// Signals when an append starts, then holds it until the gate opens
    struct GatedSink {
        started: std_mpsc::Sender<()>,
        gate: std_mpsc::Receiver<()>,
        written: Arc<AtomicUsize>,
    }

    impl AuditSink for GatedSink {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn append(&mut self, _entry: &AuditEntry) -> io::Result<()> {
            let _ = self.started.send(());
            let _ = self.gate.recv();
            self.written.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record() -> FeatureRecord {
        validate(&json!({
            "MedInc": 3.0, "HouseAge": 20, "AveRooms": 5.0, "AveBedrms": 1.0,
            "Population": 1000, "AveOccup": 3.0, "Latitude": 34.0, "Longitude": -118.0
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_entries_written_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("predictions.log");
        let table_path = dir.path().join("predictions.csv");
        let recorder = Arc::new(AuditRecorder::open(&log_path, &table_path).unwrap());
        let metrics = Arc::new(MetricsRegistry::new());
        let (writer, _handle) = AuditWriter::spawn(recorder, metrics).unwrap();

        for i in 0..20 {
            writer.submit(&record(), i as f64);
        }
        writer.flush().await;

        let rows = read_table(&table_path).unwrap();
        let predictions: Vec<f64> = rows.iter().map(|r| r.prediction).collect();
        assert_eq!(predictions, (0..20).map(|i| i as f64).collect::<Vec<_>>());
        assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_sink_failure_is_counted_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let table_path = dir.path().join("predictions.csv");
        let sinks: Vec<Box<dyn AuditSink>> = vec![
            Box::new(FailingSink),
            Box::new(TableSink::open(&table_path).unwrap()),
        ];
        let metrics = Arc::new(MetricsRegistry::new());
        let (writer, _handle) =
            AuditWriter::spawn(Arc::new(AuditRecorder::with_sinks(sinks)), Arc::clone(&metrics))
                .unwrap();

        writer.submit(&record(), 1.0);
        writer.flush().await;

        assert_eq!(metrics.audit_failure_count(), 1);
        assert_eq!(read_table(&table_path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_writer_thread_exits_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(
            AuditRecorder::open(dir.path().join("a.log"), dir.path().join("a.csv")).unwrap(),
        );
        let (writer, handle) =
            AuditWriter::spawn(recorder, Arc::new(MetricsRegistry::new())).unwrap();

        writer.submit(&record(), 1.0);
        drop(writer);
        handle.join().unwrap();

        assert_eq!(read_table(dir.path().join("a.csv")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_counts_entry() {
        let (started_tx, started_rx) = std_mpsc::channel();
        let (gate_tx, gate_rx) = std_mpsc::channel();
        let written = Arc::new(AtomicUsize::new(0));
        let sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(GatedSink {
            started: started_tx,
            gate: gate_rx,
            written: Arc::clone(&written),
        })];
        let metrics = Arc::new(MetricsRegistry::new());
        let (writer, _handle) = AuditWriter::with_capacity(
            Arc::new(AuditRecorder::with_sinks(sinks)),
            Arc::clone(&metrics),
            1,
        )
        .unwrap();

        writer.submit(&record(), 1.0);
        started_rx.recv().unwrap();
        writer.submit(&record(), 2.0);
        writer.submit(&record(), 3.0);
        assert_eq!(metrics.audit_failure_count(), 1);

        drop(gate_tx);
        writer.flush().await;
        assert_eq!(written.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.audit_failure_count(), 1);
    }
}
