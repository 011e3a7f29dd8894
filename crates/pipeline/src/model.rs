//! Trained classifier artifacts.
//!
//! The classifier is trained elsewhere and exported as a JSON artifact. Two
//! shapes are understood, selected by the `kind` field:
//!
//! ```json
//! { "kind": "logistic", "feature_names": [...], "intercept": -1.2, "coefficients": [...] }
//! { "kind": "gradient_boosted_trees", "feature_names": [...], "base_score": 0.0,
//!   "trees": [ { "nodes": [ { "nodeid": 0, "split": 0, "split_condition": 9.5,
//!                             "yes": 1, "no": 2, "missing": 1 },
//!                           { "nodeid": 1, "leaf": -0.4 }, { "nodeid": 2, "leaf": 0.7 } ] } ] }
//! ```
//!
//! Tree nodes follow the usual boosted-tree dump: go to `yes` when the
//! value is below `split_condition`, to `missing` when it is NaN.

use serde::Deserialize;
use std::path::Path;

use crate::error::ModelError;

/// A pretrained binary classifier producing P(positive class).
pub trait ProbabilityModel: Send + Sync {
    /// Feature names in the order the model was trained on.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive class for one feature row.
    fn predict_proba(&self, features: &[f64]) -> f64;
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Logistic regression over the raw features.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LogisticModel {
    fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(ModelError::Invalid(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }
}

impl ProbabilityModel for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Missing (NaN) features contribute nothing to the margin.
    fn predict_proba(&self, features: &[f64]) -> f64 {
        let margin = self
            .coefficients
            .iter()
            .zip(features)
            .filter(|(_, value)| !value.is_nan())
            .fold(self.intercept, |acc, (coef, value)| acc + coef * value);
        sigmoid(margin)
    }
}

/// One node of a regression tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        nodeid: usize,
        split: usize,
        split_condition: f64,
        yes: usize,
        no: usize,
        missing: usize,
    },
    Leaf {
        nodeid: usize,
        leaf: f64,
    },
}

impl TreeNode {
    #[must_use]
    pub const fn id(&self) -> usize {
        match self {
            Self::Split { nodeid, .. } | Self::Leaf { nodeid, .. } => *nodeid,
        }
    }
}

/// A single regression tree, nodes indexed by id after validation.
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Sorts nodes by id and checks the tree is well formed.
    ///
    /// Ids must be `0..n`, splits must reference known features, and children
    /// must have larger ids than their parent, which rules out cycles.
    fn validate(&mut self, feature_count: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("tree without nodes".to_string()));
        }
        self.nodes.sort_by_key(TreeNode::id);

        for (index, node) in self.nodes.iter().enumerate() {
            if node.id() != index {
                return Err(ModelError::Invalid(format!(
                    "node ids must be contiguous from 0, found {} at position {index}",
                    node.id()
                )));
            }
            if let TreeNode::Split {
                nodeid,
                split,
                yes,
                no,
                missing,
                ..
            } = node
            {
                if *split >= feature_count {
                    return Err(ModelError::Invalid(format!(
                        "node {nodeid} splits on feature {split}, model has {feature_count}"
                    )));
                }
                for child in [yes, no, missing] {
                    if *child <= *nodeid || *child >= self.nodes.len() {
                        return Err(ModelError::Invalid(format!(
                            "node {nodeid} has invalid child {child}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf value reached by `features`.
    fn leaf_value(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { leaf, .. } => return *leaf,
                TreeNode::Split {
                    split,
                    split_condition,
                    yes,
                    no,
                    missing,
                    ..
                } => {
                    let value = features.get(*split).copied().unwrap_or(f64::NAN);
                    index = if value.is_nan() {
                        *missing
                    } else if value < *split_condition {
                        *yes
                    } else {
                        *no
                    };
                }
            }
        }
    }
}

/// Gradient-boosted tree ensemble with a logistic link.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsembleModel {
    pub feature_names: Vec<String>,
    /// Margin added before the sigmoid.
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsembleModel {
    fn validate(&mut self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("ensemble without trees".to_string()));
        }
        let feature_count = self.feature_names.len();
        self.trees
            .iter_mut()
            .try_for_each(|tree| tree.validate(feature_count))
    }
}

impl ProbabilityModel for TreeEnsembleModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        let margin = self
            .trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.leaf_value(features));
        sigmoid(margin)
    }
}

/// A classifier artifact as stored on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic(LogisticModel),
    GradientBoostedTrees(TreeEnsembleModel),
}

impl ModelArtifact {
    /// Reads and validates an artifact file.
    ///
    /// # Errors
    /// Returns an error if the file is missing, malformed, or inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: display.clone(),
            source,
        })?;

        Self::from_json(&contents).map_err(|err| match err {
            ModelError::Parse { source, .. } => ModelError::Parse {
                path: display,
                source,
            },
            other => other,
        })
    }

    /// Parses and validates an artifact from JSON text.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the model is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let mut artifact: Self = serde_json::from_str(json).map_err(|source| ModelError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;

        match &mut artifact {
            Self::Logistic(model) => model.validate()?,
            Self::GradientBoostedTrees(model) => model.validate()?,
        }

        Ok(artifact)
    }

    /// Short name of the model kind, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Logistic(_) => "logistic",
            Self::GradientBoostedTrees(_) => "gradient_boosted_trees",
        }
    }
}

impl ProbabilityModel for ModelArtifact {
    fn feature_names(&self) -> &[String] {
        match self {
            Self::Logistic(model) => model.feature_names(),
            Self::GradientBoostedTrees(model) => model.feature_names(),
        }
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        match self {
            Self::Logistic(model) => model.predict_proba(features),
            Self::GradientBoostedTrees(model) => model.predict_proba(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(40.0) > 0.999_999);
        assert!(sigmoid(-40.0) < 1e-6);
    }

    #[test]
    fn test_logistic_prediction() {
        let model = LogisticModel {
            feature_names: names(2),
            intercept: -1.0,
            coefficients: vec![0.5, 2.0],
        };
        // margin = -1 + 0.5 * 2 + 2 * 0 = 0
        assert!((model.predict_proba(&[2.0, 0.0]) - 0.5).abs() < 1e-12);
        // NaN feature is skipped
        assert!((model.predict_proba(&[2.0, f64::NAN]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_coefficient_count_checked() {
        let json = r#"{"kind": "logistic", "feature_names": ["a", "b"], "intercept": 0.0, "coefficients": [1.0]}"#;
        let err = ModelArtifact::from_json(json).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    fn stump_json() -> &'static str {
        r#"{
            "kind": "gradient_boosted_trees",
            "feature_names": ["f0", "f1"],
            "base_score": 0.0,
            "trees": [
                {"nodes": [
                    {"nodeid": 2, "leaf": 1.0},
                    {"nodeid": 0, "split": 0, "split_condition": 10.0, "yes": 1, "no": 2, "missing": 1},
                    {"nodeid": 1, "leaf": -1.0}
                ]},
                {"nodes": [
                    {"nodeid": 0, "split": 1, "split_condition": 0.5, "yes": 1, "no": 2, "missing": 2},
                    {"nodeid": 1, "leaf": 0.0},
                    {"nodeid": 2, "leaf": 0.5}
                ]}
            ]
        }"#
    }

    #[test]
    fn test_tree_ensemble_prediction() {
        let artifact = ModelArtifact::from_json(stump_json()).unwrap();
        assert_eq!(artifact.kind(), "gradient_boosted_trees");

        // f0 < 10 -> -1.0; f1 >= 0.5 -> 0.5
        let p = artifact.predict_proba(&[5.0, 1.0]);
        assert!((p - sigmoid(-0.5)).abs() < 1e-12);

        // f0 >= 10 -> 1.0; f1 < 0.5 -> 0.0
        let p = artifact.predict_proba(&[12.0, 0.0]);
        assert!((p - sigmoid(1.0)).abs() < 1e-12);

        // missing values follow the missing branch
        let p = artifact.predict_proba(&[f64::NAN, f64::NAN]);
        assert!((p - sigmoid(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_tree_rejects_backward_child() {
        let json = r#"{
            "kind": "gradient_boosted_trees",
            "feature_names": ["f0"],
            "trees": [{"nodes": [
                {"nodeid": 0, "split": 0, "split_condition": 1.0, "yes": 0, "no": 1, "missing": 1},
                {"nodeid": 1, "leaf": 0.0}
            ]}]
        }"#;
        assert!(matches!(
            ModelArtifact::from_json(json),
            Err(ModelError::Invalid(_))
        ));
    }

    #[test]
    fn test_tree_rejects_unknown_feature() {
        let json = r#"{
            "kind": "gradient_boosted_trees",
            "feature_names": ["f0"],
            "trees": [{"nodes": [
                {"nodeid": 0, "split": 3, "split_condition": 1.0, "yes": 1, "no": 2, "missing": 1},
                {"nodeid": 1, "leaf": 0.0},
                {"nodeid": 2, "leaf": 1.0}
            ]}]
        }"#;
        assert!(matches!(
            ModelArtifact::from_json(json),
            Err(ModelError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let err = ModelArtifact::from_json(r#"{"kind": "neural_net"}"#).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(stump_json().as_bytes()).unwrap();

        let artifact = ModelArtifact::load(file.path()).unwrap();
        assert_eq!(artifact.feature_names(), &["f0".to_string(), "f1".to_string()]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelArtifact::load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
