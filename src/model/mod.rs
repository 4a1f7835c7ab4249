//! Model adapter
//!
//! Wraps the trained regressor exported by the training pipeline behind a
//! single prediction call. The active model can be replaced at runtime
//! without interrupting in-flight predictions.

mod adapter;
mod artifact;

pub use adapter::{LoadedModel, ModelAdapter, ModelInfo};
pub use artifact::{DecisionTree, LinearModel, ModelArtifact, TreeNode};

use crate::features::FEATURE_COUNT;
use std::path::PathBuf;
use thiserror::Error;

/// Anything that maps an ordered feature vector to a scalar
pub trait Regressor: Send + Sync {
    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64;
}

/// Errors loading a model artifact
#[derive(Debug, Error)]
pub enum ModelError {
    /// Artifact could not be read
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact is not a recognised model document
    #[error("Malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    /// Artifact parsed but its parameters are unusable
    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

/// Raised at startup when no model can be loaded; the service must not start.
pub type ModelUnavailableError = ModelError;

/// Reload failed; the previous model is still active
#[derive(Debug, Error)]
#[error("Model reload from {path} failed: {source}")]
pub struct ReloadError {
    pub path: PathBuf,
    #[source]
    pub source: ModelError,
}

/// Prediction could not produce a usable value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("Model produced a non-finite prediction ({0})")]
    NonFinite(f64),
}
