//! Housing Inference
//!
//! Serves a pre-trained California housing regression model over HTTP.
//!
//! # Request Flow
//!
//! ```text
//! POST /predict
//!      │
//!      ▼
//! ┌──────────────┐   reject   ┌──────────────────────────┐
//! │  features    │──────────▶│ 400 + field violations    │
//! │  (validate)  │            └──────────────────────────┘
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐            ┌──────────────────────────┐
//! │    model     │───────────▶│ metrics (count, latency) │
//! │  (predict)   │            └──────────────────────────┘
//! └──────┬───────┘            ┌──────────────────────────┐
//!        │───────────────────▶│ audit (log + CSV table)  │
//!        ▼                    └──────────────────────────┘
//! 200 {"prediction": f64}
//! ```
//!
//! # Modules
//!
//! - [`features`]: feature schema and range validation
//! - [`model`]: swappable model handle and artifact loading
//! - [`audit`]: dual-sink audit trail with a background writer
//! - [`metrics`]: Prometheus counters and latency histogram
//! - [`service`]: per-request orchestration
//! - [`server`]: HTTP endpoints

pub mod audit;
pub mod cli;
pub mod config;
pub mod features;
pub mod metrics;
pub mod model;
pub mod server;
pub mod service;

pub use audit::{AuditEntry, AuditRecorder, AuditWriter};
pub use config::ServiceConfig;
pub use features::{validate, FeatureField, FeatureRecord, ValidationError};
pub use metrics::MetricsRegistry;
pub use model::{ModelAdapter, ModelInfo};
pub use service::{InferenceService, PredictionResult, ServiceError};
