//! Swappable model handle

use super::{
    ModelArtifact, ModelError, ModelUnavailableError, PredictionError, Regressor, ReloadError,
};
use crate::features::FeatureRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, instrument, warn};

/// Provenance of a loaded model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Artifact path the model was loaded from
    pub path: PathBuf,
    /// SHA-256 of the artifact bytes
    pub sha256: String,
    /// Model family
    pub kind: String,
    /// When the model became active
    pub loaded_at: DateTime<Utc>,
}

/// An immutable, ready-to-serve model
pub struct LoadedModel {
    regressor: Box<dyn Regressor>,
    info: ModelInfo,
}

impl LoadedModel {
    /// Read and check an artifact from disk
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = ModelArtifact::from_slice(&bytes)?;

        let info = ModelInfo {
            path: path.to_path_buf(),
            sha256: hex_digest(&bytes),
            kind: artifact.kind().to_string(),
            loaded_at: Utc::now(),
        };

        Ok(Self {
            regressor: Box::new(artifact),
            info,
        })
    }

    /// Wrap an in-memory regressor
    pub fn from_regressor(regressor: impl Regressor + 'static, info: ModelInfo) -> Self {
        Self {
            regressor: Box::new(regressor),
            info,
        }
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Holder of the active model handle.
///
/// Readers clone the `Arc` under a short read lock and predict without any
/// lock held; `reload` only replaces the `Arc` once the new artifact has
/// loaded cleanly.
pub struct ModelAdapter {
    handle: RwLock<Arc<LoadedModel>>,
}

impl ModelAdapter {
    /// Load the initial model; failure means the service cannot start
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelUnavailableError> {
        let model = LoadedModel::from_path(path.as_ref())?;
        info!(
            kind = %model.info.kind,
            sha256 = %model.info.sha256,
            "Model loaded"
        );
        Ok(Self::new(model))
    }

    pub fn new(model: LoadedModel) -> Self {
        Self {
            handle: RwLock::new(Arc::new(model)),
        }
    }

    /// Capture the current handle
    pub fn current(&self) -> Arc<LoadedModel> {
        match self.handle.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Predict with the handle active at call start
    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictionError> {
        let model = self.current();
        let y = model.regressor.predict(&record.to_vector());
        if y.is_finite() {
            Ok(y)
        } else {
            Err(PredictionError::NonFinite(y))
        }
    }

    /// Install a new model from disk, keeping the old one on failure
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<ModelInfo, ReloadError> {
        let path = path.as_ref();
        let model = LoadedModel::from_path(path).map_err(|source| {
            warn!(error = %source, "Model reload failed, keeping active model");
            ReloadError {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let info = model.info.clone();
        let new = Arc::new(model);
        match self.handle.write() {
            Ok(mut guard) => *guard = new,
            Err(poisoned) => *poisoned.into_inner() = new,
        }

        info!(kind = %info.kind, sha256 = %info.sha256, "Model reloaded");
        Ok(info)
    }

    /// Provenance of the active model
    pub fn info(&self) -> ModelInfo {
        self.current().info.clone()
    }
}
