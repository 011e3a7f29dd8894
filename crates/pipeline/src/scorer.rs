//! Applies the classifier to derived feature vectors.

use std::path::Path;

use crate::error::ModelError;
use crate::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::model::{ModelArtifact, ProbabilityModel};

/// A classifier whose feature layout matches [`FEATURE_NAMES`].
pub struct Scorer {
    model: Box<dyn ProbabilityModel>,
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorer")
            .field("feature_names", &self.model.feature_names())
            .finish()
    }
}

impl Scorer {
    /// Wraps a model after checking it was trained on the derived features.
    ///
    /// # Errors
    /// Returns [`ModelError::SchemaMismatch`] if the model's feature names or
    /// their order differ from [`FEATURE_NAMES`].
    pub fn new(model: Box<dyn ProbabilityModel>) -> Result<Self, ModelError> {
        let actual = model.feature_names();
        if actual.len() != FEATURE_COUNT || actual.iter().zip(FEATURE_NAMES).any(|(a, e)| a != e) {
            return Err(ModelError::SchemaMismatch {
                expected: FEATURE_NAMES.iter().map(ToString::to_string).collect(),
                actual: actual.to_vec(),
            });
        }
        Ok(Self { model })
    }

    /// Loads an artifact from disk and wraps it.
    ///
    /// # Errors
    /// Returns an error if the artifact cannot be loaded or has the wrong schema.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let artifact = ModelArtifact::load(path.as_ref())?;
        tracing::info!(
            "Loaded {} model from {}",
            artifact.kind(),
            path.as_ref().display()
        );
        Self::new(Box::new(artifact))
    }

    /// Probability of the positive class for each row, in input order.
    ///
    /// Every probability is within `[0, 1]`; a NaN model output becomes 0.
    #[must_use]
    pub fn score(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.iter()
            .map(|row| {
                let p = self.model.predict_proba(row.as_slice());
                if p.is_nan() {
                    0.0
                } else {
                    p.clamp(0.0, 1.0)
                }
            })
            .collect()
    }
}
