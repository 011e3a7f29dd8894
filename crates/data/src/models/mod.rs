//! Data models for the IPO advisor.
//!
//! Models derive `sqlx::FromRow` for database compatibility.

pub mod prediction;
pub mod raw_observation;

pub use prediction::ScoredPrediction;
pub use raw_observation::{RawNumber, RawObservation};
