//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::Utc;
use housing_inference::audit::{AuditRecorder, AuditWriter};
use housing_inference::config::ServiceConfig;
use housing_inference::metrics::MetricsRegistry;
use housing_inference::model::{LoadedModel, ModelAdapter, ModelInfo, Regressor};
use housing_inference::service::InferenceService;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Coefficients of the reference least-squares model
pub const LINEAR_MODEL: &str = r#"{
    "kind": "linear",
    "intercept": -36.94192020718441,
    "coefficients": [0.4366932931343245, 0.009435778033238, -0.1073220801295547,
                     0.6450656935198138, -3.976389421180495e-06, -0.003786542654970986,
                     -0.4213143775271351, -0.4345137546747773]
}"#;

/// A small regression tree over MedInc and Latitude
pub const TREE_MODEL: &str = r#"{
    "kind": "decision_tree",
    "nodes": [
        {"feature": 0, "threshold": 5.0, "left": 1, "right": 2},
        {"leaf": 1.5},
        {"feature": 6, "threshold": 38.0, "left": 3, "right": 4},
        {"leaf": 4.25},
        {"leaf": 2.75}
    ]
}"#;

/// Service plus the files backing it
pub struct Harness {
    pub dir: TempDir,
    pub config: ServiceConfig,
    pub service: InferenceService,
}

fn test_config(dir: &Path) -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_path: dir.join("best_model.json"),
        audit_log_path: dir.join("logs").join("predictions.log"),
        audit_table_path: dir.join("logs").join("predictions.csv"),
        ..ServiceConfig::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(dir.path());
        fs::write(&config.model_path, LINEAR_MODEL).expect("Failed to write model");

        let (service, _writer) = InferenceService::start(&config).expect("Service failed to start");

        Self {
            dir,
            config,
            service,
        }
    }

    /// Service backed by an in-memory regressor instead of an artifact
    pub fn with_regressor(regressor: impl Regressor + 'static) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(dir.path());

        let info = ModelInfo {
            path: config.model_path.clone(),
            sha256: String::new(),
            kind: "in_memory".to_string(),
            loaded_at: Utc::now(),
        };
        let model = ModelAdapter::new(LoadedModel::from_regressor(regressor, info));

        let recorder = AuditRecorder::open(&config.audit_log_path, &config.audit_table_path)
            .expect("Failed to open audit sinks");
        let metrics = Arc::new(MetricsRegistry::new());
        let (audit, _writer) = AuditWriter::spawn(Arc::new(recorder), Arc::clone(&metrics))
            .expect("Failed to start audit writer");
        let service = InferenceService::new(model, &config.model_path, audit, metrics);

        Self {
            dir,
            config,
            service,
        }
    }

    pub fn table_path(&self) -> &PathBuf {
        &self.config.audit_table_path
    }

    pub fn log_lines(&self) -> Vec<String> {
        fs::read_to_string(&self.config.audit_log_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Write an artifact next to the configured model
    pub fn write_artifact(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("Failed to write artifact");
        path
    }
}

/// The first block group of the California housing dataset
pub fn reference_payload() -> Value {
    json!({
        "MedInc": 8.3252,
        "HouseAge": 41.0,
        "AveRooms": 6.984127,
        "AveBedrms": 1.02381,
        "Population": 322.0,
        "AveOccup": 2.555556,
        "Latitude": 37.88,
        "Longitude": -122.23
    })
}

/// Reference payload with a varied MedInc so rows are distinguishable
pub fn payload_with_income(med_inc: f64) -> Value {
    let mut payload = reference_payload();
    payload["MedInc"] = json!(med_inc);
    payload
}
