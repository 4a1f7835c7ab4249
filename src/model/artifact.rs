//! Serialized model artifacts
//!
//! The training pipeline exports the selected regressor as a JSON document
//! tagged by `kind`. Only two families are produced: ordinary least squares
//! and a depth-limited regression tree.

use super::{ModelError, Regressor};
use crate::features::FEATURE_COUNT;
use serde::{Deserialize, Serialize};

/// Deserialized artifact, checked before it can serve predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    DecisionTree(DecisionTree),
}

impl ModelArtifact {
    /// Parse an artifact from JSON bytes and check its structure
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        artifact.check()?;
        Ok(artifact)
    }

    /// Short name of the model family
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Linear(_) => "linear",
            ModelArtifact::DecisionTree(_) => "decision_tree",
        }
    }

    fn check(&self) -> Result<(), ModelError> {
        match self {
            ModelArtifact::Linear(model) => model.check(),
            ModelArtifact::DecisionTree(tree) => tree.check(),
        }
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        match self {
            ModelArtifact::Linear(model) => model.predict(x),
            ModelArtifact::DecisionTree(tree) => tree.predict(x),
        }
    }
}

/// `y = intercept + coefficients · x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    fn check(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "expected {} coefficients, found {}",
                FEATURE_COUNT,
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid("non-finite linear parameter".to_string()));
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x.iter())
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }
}

/// Node of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Leaf {
        leaf: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Regression tree stored as a flat node list rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn check(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("decision tree has no nodes".to_string()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { leaf } => {
                    if !leaf.is_finite() {
                        return Err(ModelError::Invalid(format!("node {idx}: non-finite leaf")));
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(ModelError::Invalid(format!(
                            "node {idx}: feature index {feature} out of range"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::Invalid(format!(
                            "node {idx}: non-finite threshold"
                        )));
                    }
                    // Children must come after their parent, which also rules out cycles.
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(ModelError::Invalid(format!(
                                "node {idx}: invalid child index {child}"
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl Regressor for DecisionTree {
    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: [f64; FEATURE_COUNT] = [
        8.3252, 41.0, 6.984127, 1.02381, 322.0, 2.555556, 37.88, -122.23,
    ];

    #[test]
    fn test_linear_prediction() {
        let artifact = ModelArtifact::from_slice(
            br#"{"kind":"linear","intercept":1.0,"coefficients":[1,0,0,0,0,0,0,0]}"#,
        )
        .unwrap();

        assert_eq!(artifact.kind(), "linear");
        assert!((artifact.predict(&X) - 9.3252).abs() < 1e-12);
    }

    #[test]
    fn test_linear_rejects_wrong_arity() {
        let err = ModelArtifact::from_slice(
            br#"{"kind":"linear","intercept":1.0,"coefficients":[1,2,3]}"#,
        )
        .unwrap_err();

        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_tree_prediction_follows_splits() {
        let artifact = ModelArtifact::from_slice(
            br#"{"kind":"decision_tree","nodes":[
                {"feature":0,"threshold":5.0,"left":1,"right":2},
                {"leaf":1.5},
                {"feature":6,"threshold":38.0,"left":3,"right":4},
                {"leaf":4.25},
                {"leaf":2.75}
            ]}"#,
        )
        .unwrap();

        assert_eq!(artifact.kind(), "decision_tree");
        assert_eq!(artifact.predict(&X), 4.25);

        let mut low_income = X;
        low_income[0] = 2.0;
        assert_eq!(artifact.predict(&low_income), 1.5);
    }

    #[test]
    fn test_tree_rejects_backward_child() {
        let err = ModelArtifact::from_slice(
            br#"{"kind":"decision_tree","nodes":[
                {"feature":0,"threshold":5.0,"left":0,"right":1},
                {"leaf":1.5}
            ]}"#,
        )
        .unwrap_err();

        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_tree_rejects_bad_feature_index() {
        let err = ModelArtifact::from_slice(
            br#"{"kind":"decision_tree","nodes":[
                {"feature":8,"threshold":5.0,"left":1,"right":2},
                {"leaf":1.5},
                {"leaf":2.5}
            ]}"#,
        )
        .unwrap_err();

        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let err = ModelArtifact::from_slice(br#"{"kind":"random_forest"}"#).unwrap_err();
        assert!(matches!(err, ModelError::Parse(_)));
    }
}
