//! Inference service
//!
//! Orchestrates one prediction request:
//!
//! ```text
//! Received ─▶ Validating ─┬─▶ Rejected (400, counted in requests_rejected_total)
//!                         └─▶ Validated ─▶ Predicting ─▶ Predicted ─▶ Responded
//!                                                           │
//!                                                           └─▶ Recording (audit writer, off the response path)
//! ```
//!
//! `requests_total` counts validated requests. Latency is measured from
//! receipt to `Predicted` and observed only for successful predictions.

use crate::audit::{AuditRecorder, AuditWriter};
use crate::config::ServiceConfig;
use crate::features::{validate, FeatureRecord, ValidationError};
use crate::metrics::MetricsRegistry;
use crate::model::{ModelAdapter, ModelInfo, PredictionError, ReloadError};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// A served prediction and its provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub features: FeatureRecord,
}

/// Failures that shape the response to a prediction request
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

/// Request orchestration over the model, audit writer and metrics
pub struct InferenceService {
    model: ModelAdapter,
    model_path: PathBuf,
    audit: AuditWriter,
    metrics: Arc<MetricsRegistry>,
}

impl InferenceService {
    /// Assemble a service from already-built components
    pub fn new(
        model: ModelAdapter,
        model_path: impl Into<PathBuf>,
        audit: AuditWriter,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            model,
            model_path: model_path.into(),
            audit,
            metrics,
        }
    }

    /// Load the model, open the audit sinks and start the audit writer.
    ///
    /// Fails if the model cannot be loaded; the service must not take
    /// traffic without one.
    pub fn start(config: &ServiceConfig) -> Result<(Self, JoinHandle<()>)> {
        let model = ModelAdapter::load(&config.model_path).with_context(|| {
            format!(
                "Model unavailable at {}; refusing to start",
                config.model_path.display()
            )
        })?;

        let recorder = AuditRecorder::open(&config.audit_log_path, &config.audit_table_path)
            .context("Failed to open audit sinks")?;

        let metrics = Arc::new(MetricsRegistry::new());
        let (audit, writer_handle) = AuditWriter::spawn(Arc::new(recorder), Arc::clone(&metrics))
            .context("Failed to start audit writer")?;

        info!(
            model = %config.model_path.display(),
            audit_log = %config.audit_log_path.display(),
            audit_table = %config.audit_table_path.display(),
            "Inference service ready"
        );

        Ok((
            Self::new(model, &config.model_path, audit, metrics),
            writer_handle,
        ))
    }

    /// Validate, predict and record one request
    #[instrument(skip_all)]
    pub fn predict(&self, raw: &Value) -> Result<PredictionResult, ServiceError> {
        let received = Instant::now();

        let features = match validate(raw) {
            Ok(features) => features,
            Err(e) => {
                self.metrics.increment_rejected_count();
                debug!(error = %e, "Request rejected");
                return Err(e.into());
            }
        };
        self.metrics.increment_request_count();

        let value = self.model.predict(&features).map_err(|e| {
            self.metrics.increment_prediction_failures();
            error!(error = %e, "Prediction failed");
            e
        })?;
        self.metrics.observe_latency(received.elapsed());

        let timestamp = self.audit.submit(&features, value);
        debug!(prediction = value, "Prediction served");

        Ok(PredictionResult {
            value,
            timestamp,
            features,
        })
    }

    /// Reload the model from `path`, or from the configured artifact path
    pub fn reload(&self, path: Option<&Path>) -> Result<ModelInfo, ReloadError> {
        let path = path.unwrap_or(self.model_path.as_path());
        let outcome = self.model.reload(path);
        self.metrics.record_reload(outcome.is_ok());
        outcome
    }

    /// Prometheus text snapshot
    pub fn export_metrics(&self) -> String {
        self.metrics.export()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn model_info(&self) -> ModelInfo {
        self.model.info()
    }

    /// Wait until all submitted audit entries are written
    pub async fn flush_audit(&self) {
        self.audit.flush().await;
    }
}
