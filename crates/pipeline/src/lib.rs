//! Scoring pipeline for the IPO advisor.
//!
//! Raw observations flow through feature derivation, the classifier and the
//! decision rules, and the resulting batch is published to the predictions
//! store and the optional upload endpoint.

pub mod error;
pub mod features;
pub mod model;
pub mod publisher;
pub mod runner;
pub mod scorer;

pub use error::{ModelError, PipelineError, PublishError, Result};
pub use features::{derive_features, DerivedFeatures, FeatureRow, FeatureVector, FEATURE_NAMES};
pub use model::{ModelArtifact, ProbabilityModel};
pub use publisher::{Delivery, PredictionPublisher};
pub use runner::{run_scoring, run_scoring_at, PipelineContext, RunOutcome, ScoringReport};
pub use scorer::Scorer;
